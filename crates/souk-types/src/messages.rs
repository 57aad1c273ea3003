//! # Anti-Entropy Sync Messages
//!
//! Catch-up messages exchanged on the request/response topics. Events
//! travel as their canonical JSON wire bytes (the exact bytes stored in the
//! log), so batches re-verify and re-hash identically on the receiving
//! side. The surrounding P2P envelope and its binary framing live in the
//! sync crate; these payloads are plain serde types.

use serde::{Deserialize, Serialize};

/// Content-type constants identifying the payload schema carried by a P2P
/// envelope.
pub mod content_type {
    /// A single event envelope (events topic).
    pub const EVENT: &str = "souk.event.v1";
    /// A range request (requests topic).
    pub const RANGE_REQUEST: &str = "souk.range-request.v1";
    /// A range response (responses topic).
    pub const RANGE_RESPONSE: &str = "souk.range-response.v1";
    /// A snapshot request (requests topic).
    pub const SNAPSHOT_REQUEST: &str = "souk.snapshot-request.v1";
    /// A snapshot response (responses topic).
    pub const SNAPSHOT_RESPONSE: &str = "souk.snapshot-response.v1";
}

/// Request a slice of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequest {
    /// Opaque cursor from a previous response; `None` starts at genesis.
    pub from: Option<String>,
    /// Maximum number of events wanted. Servers clamp this further.
    pub limit: u32,
}

/// A slice of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeResponse {
    /// Canonical wire bytes of each event, in log order.
    pub events: Vec<Vec<u8>>,
    /// Cursor for the next slice; `None` when the log is exhausted.
    pub next_cursor: Option<String>,
}

/// Request the latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    /// Optional cursor the requester has already reached.
    pub from: Option<String>,
}

/// The latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    /// Hex SHA-256 of `snapshot`; receivers verify before saving.
    pub hash: String,
    /// Snapshot bytes.
    pub snapshot: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types_are_distinct() {
        let all = [
            content_type::EVENT,
            content_type::RANGE_REQUEST,
            content_type::RANGE_RESPONSE,
            content_type::SNAPSHOT_REQUEST,
            content_type::SNAPSHOT_RESPONSE,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_range_request_json_roundtrip() {
        let req = RangeRequest {
            from: Some("0000000000000005".to_string()),
            limit: 64,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: RangeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
