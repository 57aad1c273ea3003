//! # Souk Event Store
//!
//! The authoritative persistence layer for the event ledger: an append-only
//! log keyed by insertion rank, a hash index for random access, per-resource
//! head pointers updated atomically with each append, and snapshot
//! persistence for light-node bootstrap.
//!
//! ## Domain Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Atomic appends | Log entry, hash index, and head updates commit together or not at all |
//! | Head compare-and-set | A head update whose `expected_prev` does not match aborts the whole append |
//! | Idempotent by hash | Re-appending a known hash is a no-op |
//! | Byte fidelity | Range iteration returns exactly the bytes appended |
//! | Checksummed records | Every log record carries a CRC32 verified on read |
//! | Snapshot integrity | Snapshots are persisted only if their hash matches their bytes |
//!
//! ## Crate Structure
//!
//! - `ports/` - The key-value port the host implements
//! - `adapters/` - In-memory and file-backed reference adapters
//! - `log.rs` - The event store service
//! - `keys.rs` - Persisted key layout

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod errors;
pub mod keys;
pub mod log;
pub mod ports;

// Re-export key types for convenience
pub use adapters::{FileKvStore, MemoryKvStore};
pub use errors::StoreError;
pub use log::{AppendOutcome, EventStore, HeadUpdate, RangeBatch};
pub use ports::{BatchOperation, KeyValueStore};
