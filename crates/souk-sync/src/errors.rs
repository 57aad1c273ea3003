//! Sync error types.

use souk_types::ErrorCode;
use thiserror::Error;

/// Errors from the sync engine and transport port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A peer message was oversized, undecodable, or mislabeled.
    #[error("Invalid peer message from {sender}: {reason}")]
    MessageInvalid {
        /// Claimed sender, when known.
        sender: String,
        /// What was wrong.
        reason: String,
    },

    /// A peer envelope signature failed verification.
    #[error("Invalid peer signature from {sender}")]
    SignatureInvalid {
        /// Claimed sender.
        sender: String,
    },

    /// The transport failed to publish or subscribe.
    #[error("Transport error: {message}")]
    Transport {
        /// Transport-provided detail.
        message: String,
    },

    /// The engine is stopped.
    #[error("Sync engine stopped")]
    Stopped,
}

impl SyncError {
    /// Stable error code for peer scoring.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::MessageInvalid { .. } => ErrorCode::PeerMessageInvalid,
            SyncError::SignatureInvalid { .. } => ErrorCode::PeerSignatureInvalid,
            SyncError::Transport { .. } | SyncError::Stopped => ErrorCode::PeerMessageInvalid,
        }
    }
}
