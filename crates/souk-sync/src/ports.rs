//! # Sync Ports
//!
//! The three interfaces the engine consumes:
//!
//! - [`PeerNetwork`] - the abstract pubsub transport (libp2p in
//!   production, an in-memory broadcast in tests).
//! - [`PeerKeyResolver`] - maps a peer id to its Ed25519 public key for
//!   envelope verification.
//! - [`LedgerGateway`] - the node's state path: apply ingested events,
//!   serve ranges and snapshots. The engine never touches storage or
//!   reducers directly.

use async_trait::async_trait;
use souk_crypto::PublicKey;
use souk_types::{BoundaryError, RangeResponse, SnapshotResponse};

use crate::errors::SyncError;

/// An owned subscription to one topic. Dropping or closing the handle ends
/// the subscription; its lifetime is the subscription's lifetime.
#[async_trait]
pub trait TopicSubscription: Send {
    /// Receive the next raw message, or `None` once the subscription is
    /// closed. Messages arriving faster than they are consumed may be
    /// dropped oldest-first by the transport.
    async fn recv(&mut self) -> Option<Vec<u8>>;

    /// Close the subscription.
    fn close(&mut self);
}

/// Abstract pubsub transport with per-peer identity.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Subscribe to a topic.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn TopicSubscription>, SyncError>;

    /// Publish bytes to a topic.
    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<(), SyncError>;

    /// This node's peer id.
    fn local_peer_id(&self) -> String;
}

/// Resolves a peer id to its Ed25519 public key. Stale cache entries are
/// tolerated; verification failures re-fetch upstream of this port.
pub trait PeerKeyResolver: Send + Sync {
    /// The peer's public key, if known.
    fn resolve_peer_public_key(&self, peer_id: &str) -> Option<PublicKey>;
}

/// The node's state path as the sync engine sees it.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Verify and apply one event from its canonical wire bytes. Errors
    /// reject that single event; the caller's batch continues.
    async fn apply_event_bytes(&self, bytes: &[u8]) -> Result<(), BoundaryError>;

    /// Serve a log slice for a range request. The engine has already
    /// clamped `limit` and `max_bytes`.
    async fn serve_range(
        &self,
        from: Option<String>,
        limit: u32,
        max_bytes: usize,
    ) -> Result<RangeResponse, BoundaryError>;

    /// The latest snapshot, if one exists.
    async fn latest_snapshot(&self) -> Result<Option<SnapshotResponse>, BoundaryError>;

    /// Persist a received snapshot (its hash has already been verified)
    /// and fast-forward local state onto it.
    async fn restore_snapshot(&self, hash: &str, bytes: &[u8]) -> Result<(), BoundaryError>;
}
