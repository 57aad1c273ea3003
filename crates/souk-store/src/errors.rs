//! Storage error types.

use souk_types::{BoundaryError, ErrorCode, ResourceKind};
use thiserror::Error;

/// Errors from event store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// I/O failure in the underlying key-value store.
    #[error("Store I/O error: {message}")]
    Io {
        /// Adapter-provided detail.
        message: String,
    },

    /// A record failed its checksum or could not be decoded.
    #[error("Store corruption: {message}")]
    Corrupt {
        /// What failed to decode or verify.
        message: String,
    },

    /// A head update's `expected_prev` did not match the recorded head.
    #[error(
        "Resource head conflict on {kind}/{id}: expected {expected:?}, recorded {recorded:?}"
    )]
    ResourcePrevConflict {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource id.
        id: String,
        /// Head the appender expected.
        expected: Option<String>,
        /// Head actually recorded.
        recorded: Option<String>,
    },

    /// Snapshot bytes do not hash to the caller-supplied hash.
    #[error("Snapshot hash mismatch: claimed {claimed}, computed {computed}")]
    SnapshotHashMismatch {
        /// Hash the caller claimed.
        claimed: String,
        /// Hash of the actual bytes.
        computed: String,
    },

    /// No event with this hash exists in the log.
    #[error("Event not found: {hash}")]
    EventNotFound {
        /// The missing hash.
        hash: String,
    },
}

impl StoreError {
    /// Stable error code for the collaborator boundary.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Io { .. } => ErrorCode::StoreIo,
            StoreError::Corrupt { .. } | StoreError::SnapshotHashMismatch { .. } => {
                ErrorCode::StoreCorrupt
            }
            StoreError::ResourcePrevConflict { .. } => ErrorCode::ResourcePrevConflict,
            StoreError::EventNotFound { .. } => ErrorCode::ResourceNotFound,
        }
    }
}

impl From<StoreError> for BoundaryError {
    fn from(err: StoreError) -> Self {
        BoundaryError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_code() {
        let err = StoreError::ResourcePrevConflict {
            kind: ResourceKind::Contract,
            id: "c-1".to_string(),
            expected: Some("h0".to_string()),
            recorded: Some("h1".to_string()),
        };
        assert_eq!(err.code(), ErrorCode::ResourcePrevConflict);
        assert!(err.to_string().contains("contract/c-1"));
    }
}
