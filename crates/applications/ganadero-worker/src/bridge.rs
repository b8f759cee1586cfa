//! Messages from the worker to every open application context

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// A message posted to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// A sync pass finished; `count` operations were replayed and removed
    SyncComplete {
        /// Operations removed from the queue in the pass
        count: usize,
    },
    /// The connectivity monitor observed a transition
    ConnectivityChanged {
        /// New state
        online: bool,
    },
}

/// Fan-out channel to connected clients.
///
/// Delivery is at-most-once: a client only sees messages broadcast while it
/// is subscribed, and a client that falls too far behind loses the oldest.
#[derive(Debug, Clone)]
pub struct MessageBridge {
    sender: broadcast::Sender<WorkerMessage>,
}

impl MessageBridge {
    /// Bridge buffering up to `capacity` undelivered messages per client
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Connect a client
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.sender.subscribe()
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Post `message` to every connected client; returns how many there were
    pub fn broadcast(&self, message: WorkerMessage) -> usize {
        match self.sender.send(message) {
            Ok(clients) => {
                debug!(clients, "Broadcast worker message");
                clients
            }
            Err(broadcast::error::SendError(message)) => {
                debug!(?message, "No clients connected; message dropped");
                0
            }
        }
    }
}

impl Default for MessageBridge {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            serde_json::to_value(WorkerMessage::SyncComplete { count: 2 }).unwrap(),
            json!({"type": "SYNC_COMPLETE", "count": 2})
        );
        assert_eq!(
            serde_json::to_value(WorkerMessage::ConnectivityChanged { online: false }).unwrap(),
            json!({"type": "CONNECTIVITY_CHANGED", "online": false})
        );
    }

    #[tokio::test]
    async fn test_every_connected_client_receives() {
        let bridge = MessageBridge::default();
        let mut a = bridge.subscribe();
        let mut b = bridge.subscribe();

        assert_eq!(bridge.broadcast(WorkerMessage::SyncComplete { count: 1 }), 2);

        assert_eq!(a.recv().await.unwrap(), WorkerMessage::SyncComplete { count: 1 });
        assert_eq!(b.recv().await.unwrap(), WorkerMessage::SyncComplete { count: 1 });
    }

    #[tokio::test]
    async fn test_late_and_departed_clients_miss_messages() {
        let bridge = MessageBridge::default();
        let departed = bridge.subscribe();
        drop(departed);

        assert_eq!(bridge.broadcast(WorkerMessage::SyncComplete { count: 3 }), 0);

        let mut late = bridge.subscribe();
        assert!(late.try_recv().is_err());
    }
}
