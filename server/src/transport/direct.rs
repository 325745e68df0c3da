//! Dispatcher for connections this process terminates itself.
//!
//! Each peer owns an unbounded outbound queue drained by its own socket task,
//! so a slow socket only backs up its own queue.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use drawboard_shared::DiagramEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;

struct Peer {
    tx: mpsc::UnboundedSender<DiagramEvent>,
    user_id: Option<String>,
    groups: HashSet<String>,
}

#[derive(Default)]
pub struct PeerRegistry {
    peers: DashMap<String, Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        connection_id: &str,
        user_id: Option<String>,
    ) -> mpsc::UnboundedReceiver<DiagramEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.insert(
            connection_id.to_string(),
            Peer {
                tx,
                user_id,
                groups: HashSet::new(),
            },
        );
        rx
    }

    pub fn unregister(&self, connection_id: &str) -> bool {
        self.peers.remove(connection_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn send_where(&self, event: &DiagramEvent, mut include: impl FnMut(&str, &Peer) -> bool) {
        let mut stale = Vec::new();
        for entry in self.peers.iter() {
            if !include(entry.key(), entry.value()) {
                continue;
            }
            if entry.value().tx.send(event.clone()).is_err() {
                stale.push(entry.key().clone());
            }
        }
        for connection_id in stale {
            warn!(
                conn = %connection_id,
                event = event.kind(),
                "dropping event for closed connection"
            );
            self.peers.remove(&connection_id);
        }
    }
}

#[async_trait]
impl Dispatcher for PeerRegistry {
    async fn to_all(&self, event: &DiagramEvent) {
        self.send_where(event, |_, _| true);
    }

    async fn to_others(&self, sender: &str, event: &DiagramEvent) {
        self.send_where(event, |id, _| id != sender);
    }

    async fn to_connection(&self, connection_id: &str, event: &DiagramEvent) {
        self.send_where(event, |id, _| id == connection_id);
    }

    async fn to_group(&self, group: &str, event: &DiagramEvent) {
        self.send_where(event, |_, peer| peer.groups.contains(group));
    }

    async fn to_user(&self, user_id: &str, event: &DiagramEvent) {
        self.send_where(event, |_, peer| peer.user_id.as_deref() == Some(user_id));
    }

    async fn add_to_group(&self, connection_id: &str, group: &str) {
        match self.peers.get_mut(connection_id) {
            Some(mut peer) => {
                peer.groups.insert(group.to_string());
            }
            None => debug!(conn = %connection_id, group, "add_to_group for unknown connection"),
        }
    }
}
