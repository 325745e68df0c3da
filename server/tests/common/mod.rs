//! In-process server bound to an ephemeral port, plus websocket helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use drawboard_server::store::DiagramStore;
use drawboard_server::transport::direct::PeerRegistry;
use drawboard_server::{router, AppState, Transport};
use drawboard_shared::{decode_binary, decode_text, DiagramEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    addr: SocketAddr,
    store: Arc<DiagramStore>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_transport(Transport::Direct(Arc::new(PeerRegistry::new()))).await
    }

    pub async fn with_transport(transport: Transport) -> Self {
        let store = Arc::new(DiagramStore::new());
        let app = router(AppState::new(store.clone(), transport), None);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().expect("failed to get local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        Self {
            addr,
            store,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    pub fn store(&self) -> &DiagramStore {
        &self.store
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws{query}", self.addr)
    }

    pub async fn connect(&self) -> Socket {
        self.connect_with("").await
    }

    pub async fn connect_with(&self, query: &str) -> Socket {
        let (socket, _) = connect_async(self.ws_url(query))
            .await
            .expect("failed to connect");
        socket
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Next event on the socket, or `None` after a quiet second.
pub async fn recv(socket: &mut Socket) -> Option<DiagramEvent> {
    loop {
        let message = timeout(Duration::from_secs(1), socket.next())
            .await
            .ok()??
            .ok()?;
        match message {
            Message::Text(text) => {
                let mut events = decode_text(&text).expect("undecodable text frame");
                assert_eq!(events.len(), 1, "server sends one event per frame");
                return events.pop();
            }
            Message::Binary(bytes) => {
                return Some(decode_binary(&bytes).expect("undecodable binary frame"))
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => return None,
        }
    }
}

/// Reads until an event of `kind` arrives, returning it with everything skipped.
pub async fn recv_until(
    socket: &mut Socket,
    kind: &str,
) -> (Option<DiagramEvent>, Vec<DiagramEvent>) {
    let mut skipped = Vec::new();
    while let Some(event) = recv(socket).await {
        if event.kind() == kind {
            return (Some(event), skipped);
        }
        skipped.push(event);
    }
    (None, skipped)
}

pub async fn send_json(socket: &mut Socket, event: &DiagramEvent) {
    let text = serde_json::to_string(event).expect("serialize event");
    socket
        .send(Message::Text(text))
        .await
        .expect("send failed");
}
