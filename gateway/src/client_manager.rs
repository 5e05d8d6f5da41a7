// =============================================================================
// Client Manager (spec §4.5 / C5)
// =============================================================================
//
// Registry of connected WebSocket clients. Each client gets a bounded
// outbound mpsc channel; the send task that drains it owns the socket
// exclusively (spec §5: "one outbound client WebSocket per gateway-attached
// UI client; the client manager owns it exclusively").
//
// Dispatch is non-blocking with respect to slow consumers: a full queue
// drops the client rather than back-pressuring the broadcast hot path,
// mirroring the teacher's ring-buffer-eviction idiom in `app_state.rs`
// (`push_error` / `push_decision`) applied here to delivery instead of
// in-memory logs.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outbound channel capacity per client. A full channel means the client is
/// a slow consumer; it gets disconnected rather than stalling the hot path.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

pub struct ClientManager {
    clients: RwLock<HashMap<Uuid, mpsc::Sender<serde_json::Value>>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new client and return the receiver half the connection's
    /// send task should drain.
    pub fn register(&self) -> (Uuid, mpsc::Receiver<serde_json::Value>) {
        let client_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.clients.write().insert(client_id, tx);
        debug!(%client_id, "client registered");
        (client_id, rx)
    }

    pub fn unregister(&self, client_id: Uuid) {
        self.clients.write().remove(&client_id);
        debug!(%client_id, "client unregistered");
    }

    /// Enqueue a message for one client. Drops (and reports) the client if
    /// its outbound queue is full or it has already disconnected.
    pub fn send_to(&self, client_id: Uuid, message: serde_json::Value) -> bool {
        let sender = {
            let clients = self.clients.read();
            clients.get(&client_id).cloned()
        };
        match sender {
            Some(tx) => match tx.try_send(message) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%client_id, "outbound queue full — disconnecting slow consumer");
                    self.unregister(client_id);
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.unregister(client_id);
                    false
                }
            },
            None => false,
        }
    }

    /// Broadcast a message to every client in `client_ids`. Returns the
    /// number of clients it was actually enqueued for.
    pub fn broadcast(&self, client_ids: &[Uuid], message: &serde_json::Value) -> usize {
        let mut delivered = 0;
        for &id in client_ids {
            if self.send_to(id, message.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn is_connected(&self, client_id: Uuid) -> bool {
        self.clients.read().contains_key(&client_id)
    }

    pub fn connected_count(&self) -> usize {
        self.clients.read().len()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
