//! # Stable Error Taxonomy
//!
//! Every failure the core can surface maps to one stable string code. The
//! collaborator boundary (HTTP layer, CLI) receives `{code, message}` pairs
//! and never a raw Rust error; codes are part of the protocol surface and
//! must not change between releases.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes surfaced at the collaborator boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ErrorCode {
    // Envelope
    EventTooLarge,
    EventHashMismatch,
    EventSignatureInvalid,
    EventNonceReused,
    EventNonceWindowExceeded,
    EventPayloadInvalid,
    DidInvalid,

    // Resource
    ResourcePrevConflict,
    ResourceNotFound,
    UnauthorizedIssuer,

    // Domain
    InsufficientBalance,
    InvalidStatusTransition,
    EscrowNotExpired,
    EscrowSettled,
    BidInvalidState,
    LeaseExpired,
    LeasePaused,
    ListingNotActive,
    ContractNotActive,
    MilestoneInvalidState,
    DaoVoteOutsideWindow,
    DaoTimelockNotElapsed,
    DaoProposalNotQueued,

    // Crypto
    CryptoInvalidKey,
    CryptoInvalidSignature,
    CryptoCanonicalize,

    // Storage
    StoreIo,
    StoreCorrupt,

    // Sync
    PeerMessageInvalid,
    PeerSignatureInvalid,
}

impl ErrorCode {
    /// The stable string form of this code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EventTooLarge => "EVENT_TOO_LARGE",
            ErrorCode::EventHashMismatch => "EVENT_HASH_MISMATCH",
            ErrorCode::EventSignatureInvalid => "EVENT_SIGNATURE_INVALID",
            ErrorCode::EventNonceReused => "EVENT_NONCE_REUSED",
            ErrorCode::EventNonceWindowExceeded => "EVENT_NONCE_WINDOW_EXCEEDED",
            ErrorCode::EventPayloadInvalid => "EVENT_PAYLOAD_INVALID",
            ErrorCode::DidInvalid => "DID_INVALID",
            ErrorCode::ResourcePrevConflict => "RESOURCE_PREV_CONFLICT",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::UnauthorizedIssuer => "UNAUTHORIZED_ISSUER",
            ErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorCode::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
            ErrorCode::EscrowNotExpired => "ESCROW_NOT_EXPIRED",
            ErrorCode::EscrowSettled => "ESCROW_SETTLED",
            ErrorCode::BidInvalidState => "BID_INVALID_STATE",
            ErrorCode::LeaseExpired => "LEASE_EXPIRED",
            ErrorCode::LeasePaused => "LEASE_PAUSED",
            ErrorCode::ListingNotActive => "LISTING_NOT_ACTIVE",
            ErrorCode::ContractNotActive => "CONTRACT_NOT_ACTIVE",
            ErrorCode::MilestoneInvalidState => "MILESTONE_INVALID_STATE",
            ErrorCode::DaoVoteOutsideWindow => "DAO_VOTE_OUTSIDE_WINDOW",
            ErrorCode::DaoTimelockNotElapsed => "DAO_TIMELOCK_NOT_ELAPSED",
            ErrorCode::DaoProposalNotQueued => "DAO_PROPOSAL_NOT_QUEUED",
            ErrorCode::CryptoInvalidKey => "CRYPTO_INVALID_KEY",
            ErrorCode::CryptoInvalidSignature => "CRYPTO_INVALID_SIGNATURE",
            ErrorCode::CryptoCanonicalize => "CRYPTO_CANONICALIZE",
            ErrorCode::StoreIo => "STORE_IO",
            ErrorCode::StoreCorrupt => "STORE_CORRUPT",
            ErrorCode::PeerMessageInvalid => "PEER_MESSAGE_INVALID",
            ErrorCode::PeerSignatureInvalid => "PEER_SIGNATURE_INVALID",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `{code, message}` pair handed to collaborators. The core never lets a
/// raw error cross that boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct BoundaryError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable detail. Not stable; do not match on it.
    pub message: String,
}

impl BoundaryError {
    /// Build a boundary error from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_screaming_snake() {
        for code in [
            ErrorCode::EventTooLarge,
            ErrorCode::ResourcePrevConflict,
            ErrorCode::DaoTimelockNotElapsed,
            ErrorCode::StoreCorrupt,
        ] {
            let s = code.as_str();
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_boundary_error_display() {
        let err = BoundaryError::new(ErrorCode::InsufficientBalance, "need 401, have 400");
        assert_eq!(err.to_string(), "INSUFFICIENT_BALANCE: need 401, have 400");
    }
}
