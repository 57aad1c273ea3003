//! # In-Memory Transport Adapters
//!
//! A broadcast-channel pubsub for tests and single-process multi-node
//! simulations, plus a static key resolver. Production replaces both with
//! the host's libp2p wiring behind the same ports.

use async_trait::async_trait;
use parking_lot::RwLock;
use souk_crypto::PublicKey;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::errors::SyncError;
use crate::ports::{PeerKeyResolver, PeerNetwork, TopicSubscription};

/// Default per-subscriber buffer before oldest messages are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A shared in-process pubsub hub. Clone-cheap: nodes hold `Arc`s.
#[derive(Debug)]
pub struct InMemoryHub {
    sender: broadcast::Sender<(String, Vec<u8>)>,
}

impl InMemoryHub {
    /// Create a hub with the default buffer capacity.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a hub with a custom buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self { sender })
    }
}

/// One node's view of the hub.
pub struct InMemoryPeerNetwork {
    hub: Arc<InMemoryHub>,
    peer_id: String,
}

impl InMemoryPeerNetwork {
    /// Attach a peer to a hub.
    #[must_use]
    pub fn new(hub: Arc<InMemoryHub>, peer_id: impl Into<String>) -> Self {
        Self {
            hub,
            peer_id: peer_id.into(),
        }
    }
}

#[async_trait]
impl PeerNetwork for InMemoryPeerNetwork {
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn TopicSubscription>, SyncError> {
        Ok(Box::new(InMemorySubscription {
            topic: topic.to_string(),
            receiver: Some(self.hub.sender.subscribe()),
        }))
    }

    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<(), SyncError> {
        // A send error only means no subscribers; gossip is fire-and-forget
        let _ = self.hub.sender.send((topic.to_string(), bytes));
        Ok(())
    }

    fn local_peer_id(&self) -> String {
        self.peer_id.clone()
    }
}

/// Subscription over the hub's broadcast channel, filtered by topic.
struct InMemorySubscription {
    topic: String,
    receiver: Option<broadcast::Receiver<(String, Vec<u8>)>>,
}

#[async_trait]
impl TopicSubscription for InMemorySubscription {
    async fn recv(&mut self) -> Option<Vec<u8>> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok((topic, bytes)) if topic == self.topic => return Some(bytes),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Backpressure policy: oldest messages drop on overflow
                    debug!(topic = %self.topic, skipped, "subscriber lagged, oldest dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn close(&mut self) {
        self.receiver = None;
    }
}

/// Key resolver backed by a static table. Production hosts resolve through
/// their peer store; tests register keys up front.
#[derive(Debug, Default)]
pub struct StaticKeyResolver {
    keys: RwLock<BTreeMap<String, PublicKey>>,
}

impl StaticKeyResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer's public key.
    pub fn register(&self, peer_id: impl Into<String>, key: PublicKey) {
        self.keys.write().insert(peer_id.into(), key);
    }
}

impl PeerKeyResolver for StaticKeyResolver {
    fn resolve_peer_public_key(&self, peer_id: &str) -> Option<PublicKey> {
        self.keys.read().get(peer_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souk_crypto::Keypair;

    #[tokio::test]
    async fn test_publish_reaches_topic_subscribers_only() {
        let hub = InMemoryHub::new();
        let alice = InMemoryPeerNetwork::new(Arc::clone(&hub), "alice");
        let bob = InMemoryPeerNetwork::new(Arc::clone(&hub), "bob");

        let mut events_sub = bob.subscribe("souk/events/1").await.unwrap();
        let mut requests_sub = bob.subscribe("souk/requests/1").await.unwrap();

        alice
            .publish("souk/events/1", b"hello".to_vec())
            .await
            .unwrap();
        alice
            .publish("souk/requests/1", b"range".to_vec())
            .await
            .unwrap();

        assert_eq!(events_sub.recv().await, Some(b"hello".to_vec()));
        assert_eq!(requests_sub.recv().await, Some(b"range".to_vec()));
    }

    #[tokio::test]
    async fn test_closed_subscription_yields_none() {
        let hub = InMemoryHub::new();
        let node = InMemoryPeerNetwork::new(hub, "n");

        let mut sub = node.subscribe("souk/events/1").await.unwrap();
        sub.close();
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_static_resolver() {
        let resolver = StaticKeyResolver::new();
        let key = Keypair::from_seed([5u8; 32]).public_key();
        resolver.register("p1", key);

        assert_eq!(resolver.resolve_peer_public_key("p1"), Some(key));
        assert_eq!(resolver.resolve_peer_public_key("p2"), None);
    }
}
