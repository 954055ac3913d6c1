use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::protocol::ChannelMessage;

/// Which server→client channel a subscriber is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Transcript,
    Status,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Transcript => "transcript",
            ChannelKind::Status => "status",
        }
    }
}

/// Fan-out registry for one channel.
///
/// Each subscriber owns a bounded queue and delivery uses `try_send`, so a
/// slow or dead subscriber never stalls the producer or its peers. Fan-out
/// iterates over a snapshot of the sender list, so concurrent register and
/// unregister calls never race it.
pub struct SubscriberRegistry {
    kind: ChannelKind,
    capacity: usize,
    subscribers: RwLock<HashMap<Uuid, mpsc::Sender<String>>>,
}

impl SubscriberRegistry {
    pub fn new(kind: ChannelKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new subscriber and return its ID plus the message feed.
    pub async fn register(&self) -> (Uuid, mpsc::Receiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.write().await.insert(id, tx);
        debug!(channel = self.kind.as_str(), %id, "Subscriber registered");
        (id, rx)
    }

    /// Remove a subscriber by ID.
    pub async fn unregister(&self, id: &Uuid) {
        if self.subscribers.write().await.remove(id).is_some() {
            debug!(channel = self.kind.as_str(), %id, "Subscriber removed");
        }
    }

    pub async fn count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Fan a message out to every subscriber. Returns the delivered count.
    ///
    /// A full queue drops the message for that subscriber only; a closed
    /// queue removes the subscriber.
    pub async fn broadcast(&self, message: &ChannelMessage) -> usize {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    channel = self.kind.as_str(),
                    "Failed to encode channel message: {}", e
                );
                return 0;
            }
        };

        let targets: Vec<(Uuid, mpsc::Sender<String>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut stale = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let fault =
                        Error::SubscriberFault(format!("send queue full for subscriber {}", id));
                    warn!(channel = self.kind.as_str(), "{}; dropping message", fault);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push(id),
            }
        }

        if !stale.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in stale {
                subscribers.remove(&id);
                debug!(channel = self.kind.as_str(), %id, "Dropped closed subscriber");
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::unix_timestamp;

    fn fragment(text: &str) -> ChannelMessage {
        ChannelMessage::Transcription {
            text: text.to_string(),
            timestamp: unix_timestamp(),
        }
    }

    #[tokio::test]
    async fn register_and_unregister() {
        let registry = SubscriberRegistry::new(ChannelKind::Transcript, 8);
        assert_eq!(registry.count().await, 0);

        let (id1, _rx1) = registry.register().await;
        let (id2, _rx2) = registry.register().await;
        assert_eq!(registry.count().await, 2);
        assert_ne!(id1, id2);

        registry.unregister(&id1).await;
        assert_eq!(registry.count().await, 1);

        registry.unregister(&id2).await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let registry = SubscriberRegistry::new(ChannelKind::Transcript, 8);
        let (_id1, mut rx1) = registry.register().await;
        let (_id2, mut rx2) = registry.register().await;

        let delivered = registry.broadcast(&fragment("hello")).await;
        assert_eq!(delivered, 2);

        let payload = rx1.recv().await.unwrap();
        assert!(payload.contains("hello"));
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned_and_isolated() {
        let registry = SubscriberRegistry::new(ChannelKind::Transcript, 8);
        let (_id1, mut rx1) = registry.register().await;
        let (_id2, rx2) = registry.register().await;
        let (_id3, mut rx3) = registry.register().await;

        drop(rx2);
        let delivered = registry.broadcast(&fragment("next")).await;
        assert_eq!(delivered, 2);
        assert_eq!(registry.count().await, 2);

        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let registry = SubscriberRegistry::new(ChannelKind::Transcript, 1);
        let (_id, _rx) = registry.register().await;

        assert_eq!(registry.broadcast(&fragment("one")).await, 1);
        // Queue is full now; the message is dropped for this subscriber
        assert_eq!(registry.broadcast(&fragment("two")).await, 0);
        // Subscriber is still registered
        assert_eq!(registry.count().await, 1);
    }
}
