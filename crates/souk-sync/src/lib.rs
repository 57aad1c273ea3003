//! # Souk Sync Engine
//!
//! Gossip and anti-entropy over an abstract pubsub transport. Three topics:
//!
//! - `events` - newly produced event envelopes, one per message.
//! - `requests` - range and snapshot catch-up requests.
//! - `responses` - range batches and snapshots.
//!
//! Every message travels inside a signed binary [`PeerEnvelope`]; the
//! ingress pipeline drops anything oversized, undecodable, self-sent, or
//! badly signed before a topic handler ever runs. Per-peer scores record
//! misbehavior; drops are silent on the wire.
//!
//! The transport itself (libp2p or anything else) stays behind the
//! [`PeerNetwork`] port, and the node's state path stays behind
//! [`LedgerGateway`] - the engine contains no storage and no reducer
//! logic of its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod engine;
pub mod envelope;
pub mod errors;
pub mod peers;
pub mod ports;
pub mod topics;

// Re-export main types
pub use adapters::{InMemoryHub, InMemoryPeerNetwork, StaticKeyResolver};
pub use engine::{SyncConfig, SyncEngine};
pub use envelope::{PeerEnvelope, PEER_PROTOCOL_VERSION};
pub use errors::SyncError;
pub use peers::{PeerScore, PeerScoreTable};
pub use ports::{LedgerGateway, PeerKeyResolver, PeerNetwork, TopicSubscription};
