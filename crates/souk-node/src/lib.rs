//! # Souk Node Runtime
//!
//! Wires the store, reducers, and sync engine into one node:
//!
//! - [`NodeService`] - the single-writer state path. Local publishes and
//!   sync ingress share one transactional apply: reducer accepts, store
//!   appends atomically, projections advance, in that order or not at all.
//! - [`views`] - read-only accessors over the current projections.
//! - [`vault`] - the key vault port and the sealed key record format.
//! - [`config`] - node configuration.
//!
//! The HTTP surface, CLI, and transport live in the host application; this
//! crate ends at the ports.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod service;
pub mod vault;
pub mod views;

// Re-export main types
pub use config::NodeConfig;
pub use service::{NodeService, PublishOutcome, SnapshotPayload};
pub use vault::{decrypt_key_record, seal_key_record, InMemoryKeyVault, KeyRecord, KeyVault};
