//! # Event Envelope
//!
//! The universal signed unit of the event log.
//!
//! ## Field semantics
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `v` | Schema version (currently 1) |
//! | `type` | Dotted event type, e.g. `wallet.transfer` |
//! | `issuer` | DID of the signer |
//! | `ts` | Millisecond UNIX timestamp |
//! | `nonce` | Positive integer, strictly increasing per issuer |
//! | `payload` | Type-specific record |
//! | `prev` | Hash of this issuer's preceding event (optional) |
//! | `resourcePrev` | Hash of the preceding event on the same resource (optional) |
//! | `pub` | Multibase-encoded signer public key |
//! | `sig` | Ed25519 signature over the canonical form minus `sig`/`hash` |
//! | `hash` | Hex SHA-256 of the canonical form minus `sig`/`hash` |
//!
//! ## Invariants
//!
//! - `hash = sha256_hex(canonicalize(envelope \ {sig, hash}))`
//! - `sig` verifies over the same bytes with the key in `pub`
//! - the DID derived from `pub` equals `issuer`
//!
//! Ed25519 signatures are deterministic, so finalizing an already-finalized
//! envelope reproduces the identical `sig` and `hash`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use souk_crypto::{canonicalize, identity, sha256_hex, CryptoError, Keypair, PublicKey, Signature};
use thiserror::Error;

use crate::errors::{BoundaryError, ErrorCode};
use crate::SCHEMA_VERSION;

/// Hard bound on the serialized envelope, enforced at every boundary
/// (publish pipeline and sync ingress). Configurable per node; this is the
/// default.
pub const MAX_EVENT_SIZE: usize = 64 * 1024;

/// Hex SHA-256 event hash, the log's primary key.
pub type EventHash = String;

/// Errors from envelope finalization and verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Serialized envelope exceeds the size bound.
    #[error("Event too large: {size} bytes, max {max} bytes")]
    TooLarge {
        /// Serialized size.
        size: usize,
        /// Enforced bound.
        max: usize,
    },

    /// Recorded `hash` does not match the recomputed canonical hash.
    #[error("Event hash mismatch: recorded {recorded}, computed {computed}")]
    HashMismatch {
        /// Hash carried by the envelope.
        recorded: String,
        /// Hash recomputed from the canonical form.
        computed: String,
    },

    /// Signature does not verify over the canonical form.
    #[error("Event signature invalid")]
    SignatureInvalid,

    /// `issuer` does not match the DID derived from `pub`.
    #[error("Issuer {issuer} does not match the signing key")]
    IssuerMismatch {
        /// The issuer claimed by the envelope.
        issuer: String,
    },

    /// The envelope is structurally unusable (missing fields, bad key
    /// encoding, uncanonicalizable payload).
    #[error("Malformed envelope: {reason}")]
    Malformed {
        /// What was wrong.
        reason: String,
    },
}

impl EnvelopeError {
    /// Stable error code for the collaborator boundary.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            EnvelopeError::TooLarge { .. } => ErrorCode::EventTooLarge,
            EnvelopeError::HashMismatch { .. } => ErrorCode::EventHashMismatch,
            EnvelopeError::SignatureInvalid => ErrorCode::EventSignatureInvalid,
            EnvelopeError::IssuerMismatch { .. } => ErrorCode::DidInvalid,
            EnvelopeError::Malformed { .. } => ErrorCode::EventPayloadInvalid,
        }
    }
}

impl From<EnvelopeError> for BoundaryError {
    fn from(err: EnvelopeError) -> Self {
        BoundaryError::new(err.code(), err.to_string())
    }
}

impl From<CryptoError> for EnvelopeError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidSignature => EnvelopeError::SignatureInvalid,
            other => EnvelopeError::Malformed {
                reason: other.to_string(),
            },
        }
    }
}

/// The signed, hashed unit of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Schema version.
    pub v: u32,

    /// Dotted event type.
    #[serde(rename = "type")]
    pub event_type: String,

    /// DID of the signer.
    pub issuer: String,

    /// Millisecond UNIX timestamp.
    pub ts: u64,

    /// Positive integer, strictly increasing per issuer.
    pub nonce: u64,

    /// Type-specific record.
    pub payload: Value,

    /// Hash of this issuer's immediately preceding event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<EventHash>,

    /// Hash of the preceding event that mutated the same resource.
    #[serde(rename = "resourcePrev", default, skip_serializing_if = "Option::is_none")]
    pub resource_prev: Option<EventHash>,

    /// Multibase-encoded signer public key.
    #[serde(rename = "pub")]
    pub public_key: String,

    /// Ed25519 signature, hex. Empty until finalized.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sig: String,

    /// Hex SHA-256 hash. Empty until finalized.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: EventHash,
}

impl EventEnvelope {
    /// Build an unsigned envelope with empty `sig` and `hash`.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        event_type: impl Into<String>,
        issuer: impl Into<String>,
        payload: Value,
        ts: u64,
        nonce: u64,
        prev: Option<EventHash>,
        resource_prev: Option<EventHash>,
        public_key: &PublicKey,
    ) -> Self {
        Self {
            v: SCHEMA_VERSION,
            event_type: event_type.into(),
            issuer: issuer.into(),
            ts,
            nonce,
            payload,
            prev,
            resource_prev,
            public_key: identity::encode_public_key(public_key),
            sig: String::new(),
            hash: String::new(),
        }
    }

    /// The canonical bytes hashed and signed: the envelope with `sig` and
    /// `hash` removed.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] if the payload cannot be
    /// canonicalized (floats, exponent numbers).
    pub fn signable_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut value = serde_json::to_value(self).map_err(|e| EnvelopeError::Malformed {
            reason: e.to_string(),
        })?;
        if let Value::Object(map) = &mut value {
            map.remove("sig");
            map.remove("hash");
        }
        canonicalize(&value).map_err(EnvelopeError::from)
    }

    /// Recompute the canonical hash without mutating the envelope.
    ///
    /// # Errors
    ///
    /// See [`EventEnvelope::signable_bytes`].
    pub fn compute_hash(&self) -> Result<EventHash, EnvelopeError> {
        Ok(sha256_hex(&self.signable_bytes()?))
    }

    /// Compute `hash`, produce `sig`, and return the frozen envelope.
    ///
    /// Idempotent: finalizing twice with the same key yields an identical
    /// envelope because Ed25519 is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::IssuerMismatch`] if the keypair does not
    /// match `issuer`, or [`EnvelopeError::Malformed`] on canonicalization
    /// failure.
    pub fn finalize(mut self, keypair: &Keypair) -> Result<Self, EnvelopeError> {
        let signer_did = identity::did_from_public_key(&keypair.public_key());
        if signer_did.as_str() != self.issuer {
            return Err(EnvelopeError::IssuerMismatch {
                issuer: self.issuer.clone(),
            });
        }

        self.public_key = identity::encode_public_key(&keypair.public_key());
        self.sig = String::new();
        self.hash = String::new();

        let bytes = self.signable_bytes()?;
        self.hash = sha256_hex(&bytes);
        self.sig = keypair.sign(&bytes).to_hex();
        Ok(self)
    }

    /// Verify the three envelope invariants: issuer/key binding, hash, and
    /// signature.
    ///
    /// # Errors
    ///
    /// - [`EnvelopeError::IssuerMismatch`] if `did(pub) != issuer`
    /// - [`EnvelopeError::HashMismatch`] if `hash` does not recompute
    /// - [`EnvelopeError::SignatureInvalid`] if `sig` does not verify
    pub fn verify(&self) -> Result<(), EnvelopeError> {
        let pk = identity::decode_public_key(&self.public_key)?;
        let did = identity::did_from_public_key(&pk);
        if did.as_str() != self.issuer {
            return Err(EnvelopeError::IssuerMismatch {
                issuer: self.issuer.clone(),
            });
        }

        let bytes = self.signable_bytes()?;
        let computed = sha256_hex(&bytes);
        if computed != self.hash {
            return Err(EnvelopeError::HashMismatch {
                recorded: self.hash.clone(),
                computed,
            });
        }

        let sig = Signature::from_hex(&self.sig).map_err(|_| EnvelopeError::SignatureInvalid)?;
        pk.verify(&bytes, &sig)
            .map_err(|_| EnvelopeError::SignatureInvalid)
    }

    /// Canonical wire bytes of the full envelope (including `sig`/`hash`),
    /// the form stored in the log and published on the events topic.
    ///
    /// # Errors
    ///
    /// See [`EventEnvelope::signable_bytes`].
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let value = serde_json::to_value(self).map_err(|e| EnvelopeError::Malformed {
            reason: e.to_string(),
        })?;
        canonicalize(&value).map_err(EnvelopeError::from)
    }

    /// Decode wire bytes back into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] on undecodable bytes.
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed {
            reason: e.to_string(),
        })
    }

    /// Serialized size of the envelope, the quantity bounded by
    /// [`MAX_EVENT_SIZE`].
    ///
    /// # Errors
    ///
    /// See [`EventEnvelope::signable_bytes`].
    pub fn encoded_size(&self) -> Result<usize, EnvelopeError> {
        Ok(self.to_wire_bytes()?.len())
    }

    /// Enforce a size bound.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::TooLarge`] above `max`.
    pub fn check_size(&self, max: usize) -> Result<(), EnvelopeError> {
        let size = self.encoded_size()?;
        if size > max {
            return Err(EnvelopeError::TooLarge { size, max });
        }
        Ok(())
    }

    /// True once `sig` and `hash` are set.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        !self.sig.is_empty() && !self.hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use souk_crypto::did_from_public_key;

    fn keypair() -> Keypair {
        Keypair::from_seed([0x11u8; 32])
    }

    fn issuer_did(kp: &Keypair) -> String {
        did_from_public_key(&kp.public_key()).as_str().to_string()
    }

    fn sample(kp: &Keypair) -> EventEnvelope {
        EventEnvelope::build(
            "wallet.transfer",
            issuer_did(kp),
            json!({"from": "a", "to": "b", "amount": 400, "fee": 1}),
            1_700_000_000_000,
            1,
            None,
            None,
            &kp.public_key(),
        )
    }

    #[test]
    fn test_finalize_then_verify() {
        let kp = keypair();
        let envelope = sample(&kp).finalize(&kp).unwrap();

        assert!(envelope.is_finalized());
        assert!(envelope.verify().is_ok());
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let kp = keypair();
        let once = sample(&kp).finalize(&kp).unwrap();
        let twice = once.clone().finalize(&kp).unwrap();

        assert_eq!(once.sig, twice.sig);
        assert_eq!(once.hash, twice.hash);
    }

    #[test]
    fn test_tampered_payload_fails_hash() {
        let kp = keypair();
        let mut envelope = sample(&kp).finalize(&kp).unwrap();
        envelope.payload["amount"] = json!(40_000);

        assert!(matches!(
            envelope.verify(),
            Err(EnvelopeError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_hash_fails_signature_path() {
        let kp = keypair();
        let mut envelope = sample(&kp).finalize(&kp).unwrap();
        // Recompute the hash over tampered content so only the signature trips
        envelope.payload["amount"] = json!(40_000);
        envelope.hash = envelope.compute_hash().unwrap();

        assert!(matches!(
            envelope.verify(),
            Err(EnvelopeError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let kp = keypair();
        let other = Keypair::from_seed([0x22u8; 32]);

        let mut envelope = sample(&kp);
        envelope.issuer = issuer_did(&other);

        assert!(matches!(
            envelope.finalize(&kp),
            Err(EnvelopeError::IssuerMismatch { .. })
        ));
    }

    #[test]
    fn test_wire_roundtrip() {
        let kp = keypair();
        let envelope = sample(&kp).finalize(&kp).unwrap();

        let bytes = envelope.to_wire_bytes().unwrap();
        let decoded = EventEnvelope::from_wire_bytes(&bytes).unwrap();

        assert_eq!(envelope, decoded);
        assert!(decoded.verify().is_ok());
        // Wire form is canonical: re-encoding is byte-identical
        assert_eq!(decoded.to_wire_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_size_bound() {
        let kp = keypair();
        let envelope = sample(&kp).finalize(&kp).unwrap();
        let size = envelope.encoded_size().unwrap();

        assert!(envelope.check_size(size).is_ok());
        assert!(matches!(
            envelope.check_size(size - 1),
            Err(EnvelopeError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_optional_chain_fields_omitted_from_wire() {
        let kp = keypair();
        let envelope = sample(&kp).finalize(&kp).unwrap();
        let text = String::from_utf8(envelope.to_wire_bytes().unwrap()).unwrap();

        assert!(!text.contains("resourcePrev"));
        assert!(!text.contains("\"prev\""));
    }
}
