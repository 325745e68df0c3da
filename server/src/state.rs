use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::store::DiagramStore;
use crate::transport::broker::BrokerClient;
use crate::transport::direct::PeerRegistry;

#[derive(Clone)]
pub enum Transport {
    /// This process terminates the client websockets.
    Direct(Arc<PeerRegistry>),
    /// An external broker holds the sockets and calls our webhooks.
    Broker(Arc<BrokerClient>),
}

impl Transport {
    pub fn dispatcher(&self) -> &dyn Dispatcher {
        match self {
            Transport::Direct(peers) => peers.as_ref(),
            Transport::Broker(broker) => broker.as_ref(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DiagramStore>,
    pub transport: Transport,
}

impl AppState {
    pub fn new(store: Arc<DiagramStore>, transport: Transport) -> Self {
        Self { store, transport }
    }

    pub fn direct() -> Self {
        Self::new(
            Arc::new(DiagramStore::new()),
            Transport::Direct(Arc::new(PeerRegistry::new())),
        )
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.transport.dispatcher()
    }
}
