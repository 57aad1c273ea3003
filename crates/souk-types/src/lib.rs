//! # Souk Types - Shared Protocol Types
//!
//! The single source of truth for the types every subsystem speaks:
//!
//! - [`EventEnvelope`] — the signed, hashed unit of the event log, with
//!   `build` / `finalize` / `verify`.
//! - [`TokenAmount`] — arbitrary-precision non-negative token arithmetic.
//! - [`ResourceRef`] — which per-resource chain an event mutates.
//! - [`NonceWindow`] — per-issuer replay detection with reorder tolerance.
//! - Sync messages (range / snapshot requests and responses).
//! - [`ErrorCode`] / [`BoundaryError`] — the stable error taxonomy surfaced
//!   at the collaborator boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod amount;
pub mod envelope;
pub mod errors;
pub mod messages;
pub mod nonce;
pub mod resource;

// Re-export main types
pub use amount::TokenAmount;
pub use envelope::{EnvelopeError, EventEnvelope, EventHash, MAX_EVENT_SIZE};
pub use errors::{BoundaryError, ErrorCode};
pub use messages::{
    content_type, RangeRequest, RangeResponse, SnapshotRequest, SnapshotResponse,
};
pub use nonce::{NonceError, NonceWindow, NONCE_WINDOW};
pub use resource::{ResourceKind, ResourceRef};

/// Schema version carried in every envelope.
pub const SCHEMA_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }
}
