//! Reducer error types.
//!
//! Every rejection a reducer can produce, each mapped to a stable code.
//! A reducer error during local publish aborts the publish; during sync
//! ingress it rejects that single event and the batch continues.

use souk_types::{BoundaryError, EnvelopeError, ErrorCode, NonceError, ResourceKind};
use thiserror::Error;

/// Errors from applying an event to state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReducerError {
    /// The envelope failed cryptographic verification.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The nonce was replayed or fell outside the issuer's window.
    #[error(transparent)]
    Nonce(#[from] NonceError),

    /// The event's `resourcePrev` does not match the recorded head.
    #[error("Resource head conflict on {kind}/{id}: expected {expected:?}, recorded {recorded:?}")]
    ResourcePrevConflict {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// `resourcePrev` carried by the event.
        expected: Option<String>,
        /// Head recorded in state.
        recorded: Option<String>,
    },

    /// The event targets a resource that does not exist.
    #[error("Resource not found: {kind}/{id}")]
    ResourceNotFound {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
    },

    /// The issuer is not authorized for this operation.
    #[error("Issuer {issuer} not authorized for {operation}")]
    UnauthorizedIssuer {
        /// The issuer DID.
        issuer: String,
        /// The rejected operation (event type).
        operation: String,
    },

    /// The payload failed to parse into its typed record.
    #[error("Invalid payload for {event_type}: {reason}")]
    InvalidPayload {
        /// Event type being parsed.
        event_type: String,
        /// Parse failure detail.
        reason: String,
    },

    /// Available balance below the required amount.
    #[error("Insufficient balance for {address}: need {needed}, have {available}")]
    InsufficientBalance {
        /// Debited address.
        address: String,
        /// Amount plus fee required.
        needed: String,
        /// Available balance.
        available: String,
    },

    /// The status transition is not an edge in the resource's lifecycle.
    #[error("Invalid status transition for {kind}/{id}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// Expiry-driven escrow refund before `expiresAt`.
    #[error("Escrow {id} not expired: now {now}, expires {expires_at}")]
    EscrowNotExpired {
        /// Escrow id.
        id: String,
        /// Event timestamp.
        now: u64,
        /// Recorded expiry.
        expires_at: u64,
    },

    /// The escrow has no remaining balance to move.
    #[error("Escrow {id} already settled")]
    EscrowSettled {
        /// Escrow id.
        id: String,
    },

    /// A bid operation in a state that does not allow it.
    #[error("Bid {id} in invalid state {status} for {operation}")]
    BidInvalidState {
        /// Bid id.
        id: String,
        /// Current bid status.
        status: String,
        /// The rejected operation.
        operation: String,
    },

    /// Lease usage against an expired lease.
    #[error("Lease {id} expired at {expires_at}")]
    LeaseExpired {
        /// Lease id.
        id: String,
        /// Recorded expiry.
        expires_at: u64,
    },

    /// Lease usage against a paused lease.
    #[error("Lease {id} is paused")]
    LeasePaused {
        /// Lease id.
        id: String,
    },

    /// An order against a listing that is not active.
    #[error("Listing {id} is not active")]
    ListingNotActive {
        /// Listing id.
        id: String,
    },

    /// A milestone operation outside the contract's active phase.
    #[error("Contract {id} is not active")]
    ContractNotActive {
        /// Contract id.
        id: String,
    },

    /// A milestone operation in a state that does not allow it.
    #[error("Milestone {milestone_id} of {contract_id} in invalid state {status}")]
    MilestoneInvalidState {
        /// Contract id.
        contract_id: String,
        /// Milestone id.
        milestone_id: String,
        /// Current milestone status.
        status: String,
    },

    /// A vote outside the proposal's voting window.
    #[error("Vote on {id} outside window [{start}, {end}]: ts {ts}")]
    DaoVoteOutsideWindow {
        /// Proposal id.
        id: String,
        /// Voting window start.
        start: u64,
        /// Voting window end.
        end: u64,
        /// Event timestamp.
        ts: u64,
    },

    /// Execution before the timelock delay elapsed.
    #[error("Timelock for {id} not elapsed: eta {eta}, ts {ts}")]
    DaoTimelockNotElapsed {
        /// Proposal id.
        id: String,
        /// Earliest execution timestamp.
        eta: u64,
        /// Event timestamp.
        ts: u64,
    },

    /// Queue/execute against a proposal in the wrong phase.
    #[error("Proposal {id} not queued (status {status})")]
    DaoProposalNotQueued {
        /// Proposal id.
        id: String,
        /// Current status.
        status: String,
    },
}

impl ReducerError {
    /// Stable error code for the collaborator boundary.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ReducerError::Envelope(e) => e.code(),
            ReducerError::Nonce(e) => e.code(),
            ReducerError::ResourcePrevConflict { .. } => ErrorCode::ResourcePrevConflict,
            ReducerError::ResourceNotFound { .. } => ErrorCode::ResourceNotFound,
            ReducerError::UnauthorizedIssuer { .. } => ErrorCode::UnauthorizedIssuer,
            ReducerError::InvalidPayload { .. } => ErrorCode::EventPayloadInvalid,
            ReducerError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            ReducerError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
            ReducerError::EscrowNotExpired { .. } => ErrorCode::EscrowNotExpired,
            ReducerError::EscrowSettled { .. } => ErrorCode::EscrowSettled,
            ReducerError::BidInvalidState { .. } => ErrorCode::BidInvalidState,
            ReducerError::LeaseExpired { .. } => ErrorCode::LeaseExpired,
            ReducerError::LeasePaused { .. } => ErrorCode::LeasePaused,
            ReducerError::ListingNotActive { .. } => ErrorCode::ListingNotActive,
            ReducerError::ContractNotActive { .. } => ErrorCode::ContractNotActive,
            ReducerError::MilestoneInvalidState { .. } => ErrorCode::MilestoneInvalidState,
            ReducerError::DaoVoteOutsideWindow { .. } => ErrorCode::DaoVoteOutsideWindow,
            ReducerError::DaoTimelockNotElapsed { .. } => ErrorCode::DaoTimelockNotElapsed,
            ReducerError::DaoProposalNotQueued { .. } => ErrorCode::DaoProposalNotQueued,
        }
    }
}

impl From<ReducerError> for BoundaryError {
    fn from(err: ReducerError) -> Self {
        BoundaryError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        let err = ReducerError::InsufficientBalance {
            address: "aa".to_string(),
            needed: "401".to_string(),
            available: "400".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::InsufficientBalance);

        let boundary: BoundaryError = err.into();
        assert_eq!(boundary.code, ErrorCode::InsufficientBalance);
    }
}
