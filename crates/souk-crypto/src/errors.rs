//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A key could not be parsed or is not a valid curve point.
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// What made the key unusable.
        reason: String,
    },

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// A value could not be canonicalized (floats, exponents, non-JSON data).
    #[error("Cannot canonicalize: {reason}")]
    Canonicalize {
        /// The offending construct.
        reason: String,
    },

    /// A DID could not be parsed back to a public key.
    #[error("Invalid DID {did}: {reason}")]
    InvalidDid {
        /// The DID string as received.
        did: String,
        /// What made it unparseable.
        reason: String,
    },

    /// Symmetric encryption failed.
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Symmetric decryption failed (wrong key, tampered ciphertext).
    #[error("Decryption failed")]
    DecryptionFailed,
}

impl CryptoError {
    /// Stable error code for the collaborator boundary.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            CryptoError::InvalidKey { .. } => "CRYPTO_INVALID_KEY",
            CryptoError::InvalidSignature => "CRYPTO_INVALID_SIGNATURE",
            CryptoError::Canonicalize { .. } => "CRYPTO_CANONICALIZE",
            CryptoError::InvalidDid { .. } => "DID_INVALID",
            CryptoError::EncryptionFailed | CryptoError::DecryptionFailed => "CRYPTO_INVALID_KEY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_codes() {
        let err = CryptoError::InvalidDid {
            did: "did:souk:zzz".to_string(),
            reason: "bad multibase".to_string(),
        };
        assert_eq!(err.code(), "DID_INVALID");
        assert_eq!(CryptoError::InvalidSignature.code(), "CRYPTO_INVALID_SIGNATURE");
    }
}
