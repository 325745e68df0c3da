use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use drawboard_shared::{
    decode_binary, decode_text, encode, DiagramEvent, Frame, WireFormat, MAX_FRAME_BYTES,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::ids::{new_background_id, new_connection_id};
use crate::logic::handle_client_event;
use crate::resync;
use crate::state::{AppState, Transport};
use crate::store::Background;
use crate::transport::direct::PeerRegistry;

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn health_handler() -> &'static str {
    "ok"
}

#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    #[serde(default)]
    pub format: WireFormat,
    pub user: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Transport::Direct(peers) = state.transport.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, peers, params))
}

fn to_message(event: &DiagramEvent, format: WireFormat) -> Option<Message> {
    match encode(event, format) {
        Ok(Frame::Text(text)) => Some(Message::Text(text)),
        Ok(Frame::Binary(bytes)) => Some(Message::Binary(bytes)),
        Err(error) => {
            warn!(event = event.kind(), %error, "failed to encode outbound event");
            None
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    peers: Arc<PeerRegistry>,
    params: SocketParams,
) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let connection_id = new_connection_id();
    let mut rx = peers.register(&connection_id, params.user.clone());
    info!(
        conn = %connection_id,
        user = params.user.as_deref().unwrap_or("-"),
        format = ?params.format,
        peers = peers.len(),
        "WS connected"
    );

    let format = params.format;
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(message) = to_message(&event, format) else {
                continue;
            };
            if socket_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    resync::on_connect(&state.store, peers.as_ref(), &connection_id).await;

    while let Some(Ok(message)) = socket_receiver.next().await {
        let decoded = match message {
            Message::Text(text) => decode_text(&text),
            Message::Binary(data) => decode_binary(&data).map(|event| vec![event]),
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    debug!(
                        conn = %connection_id,
                        code = frame.code,
                        reason = %frame.reason,
                        "WS close frame"
                    );
                }
                break;
            }
            _ => continue,
        };
        match decoded {
            Ok(events) => {
                for event in events {
                    handle_client_event(&state.store, peers.as_ref(), &connection_id, event)
                        .await;
                }
            }
            Err(error) => warn!(conn = %connection_id, %error, "dropping undecodable frame"),
        }
    }

    peers.unregister(&connection_id);
    send_task.abort();
    resync::on_disconnect(&state.store, peers.as_ref(), &connection_id).await;
    info!(conn = %connection_id, peers = peers.len(), "WS disconnected");
}

pub async fn upload_background(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => return (StatusCode::BAD_REQUEST, error.to_string()).into_response(),
        };
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => return (StatusCode::BAD_REQUEST, error.to_string()).into_response(),
        };
        let id = new_background_id();
        info!(background = %id, %content_type, size = bytes.len(), "background uploaded");
        let _editing = state.store.edit().await;
        state.store.set_background(Background {
            id: id.clone(),
            bytes,
            content_type,
        });
        state
            .dispatcher()
            .to_all(&DiagramEvent::BackgroundUpdated { id })
            .await;
        return StatusCode::OK.into_response();
    }
    (StatusCode::BAD_REQUEST, "missing `file` field").into_response()
}

pub async fn background_handler(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    match state.store.background(&id) {
        Some(background) => (
            [(CONTENT_TYPE, background.content_type)],
            background.bytes,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
