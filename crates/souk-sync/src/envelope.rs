//! # P2P Envelope
//!
//! The compact binary wrapper every gossip message travels in:
//! `{v, topic, sender, ts, content_type, payload, sig}` with an Ed25519
//! signature over the envelope's bincode encoding with the `sig` field
//! emptied. The peer's public key is resolved out-of-band through the
//! [`crate::ports::PeerKeyResolver`] port.
//!
//! The payload is opaque bytes: event envelopes ride as their canonical
//! JSON wire form, requests and responses as bincode of the message types
//! in `souk_types::messages`.

use serde::{Deserialize, Serialize};
use souk_crypto::{Keypair, PublicKey, Signature};

use crate::errors::SyncError;

/// Current P2P protocol version.
pub const PEER_PROTOCOL_VERSION: u16 = 1;

/// The signed binary wrapper for all gossip messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEnvelope {
    /// Protocol version.
    pub v: u16,
    /// Topic the message was published on.
    pub topic: String,
    /// Sender peer id.
    pub sender: String,
    /// Millisecond UNIX timestamp.
    pub ts: u64,
    /// Identifies the payload schema (see `souk_types::content_type`).
    pub content_type: String,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Ed25519 signature over the other fields; empty until signed.
    pub sig: Vec<u8>,
}

impl PeerEnvelope {
    /// Build and sign an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MessageInvalid`] if encoding fails.
    pub fn seal(
        topic: impl Into<String>,
        sender: impl Into<String>,
        ts: u64,
        content_type: impl Into<String>,
        payload: Vec<u8>,
        keypair: &Keypair,
    ) -> Result<Self, SyncError> {
        let mut envelope = Self {
            v: PEER_PROTOCOL_VERSION,
            topic: topic.into(),
            sender: sender.into(),
            ts,
            content_type: content_type.into(),
            payload,
            sig: Vec::new(),
        };
        let bytes = envelope.signable_bytes()?;
        envelope.sig = keypair.sign(&bytes).as_bytes().to_vec();
        Ok(envelope)
    }

    /// The bytes signed: the envelope's bincode encoding with `sig` empty.
    fn signable_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let unsigned = Self {
            sig: Vec::new(),
            ..self.clone()
        };
        bincode::serialize(&unsigned).map_err(|e| SyncError::MessageInvalid {
            sender: self.sender.clone(),
            reason: e.to_string(),
        })
    }

    /// Verify the signature with the sender's resolved public key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SignatureInvalid`] on any mismatch.
    pub fn verify(&self, public_key: &PublicKey) -> Result<(), SyncError> {
        let invalid = || SyncError::SignatureInvalid {
            sender: self.sender.clone(),
        };

        let sig_bytes: [u8; 64] = self.sig.as_slice().try_into().map_err(|_| invalid())?;
        let signature = Signature::from_bytes(sig_bytes);
        let bytes = self.signable_bytes()?;
        public_key.verify(&bytes, &signature).map_err(|_| invalid())
    }

    /// Wire encoding.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MessageInvalid`] if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        bincode::serialize(self).map_err(|e| SyncError::MessageInvalid {
            sender: self.sender.clone(),
            reason: e.to_string(),
        })
    }

    /// Decode from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MessageInvalid`] on undecodable bytes or a
    /// version the engine does not speak.
    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        let envelope: Self =
            bincode::deserialize(bytes).map_err(|e| SyncError::MessageInvalid {
                sender: "unknown".to_string(),
                reason: e.to_string(),
            })?;
        if envelope.v != PEER_PROTOCOL_VERSION {
            return Err(SyncError::MessageInvalid {
                sender: envelope.sender.clone(),
                reason: format!("unsupported protocol version {}", envelope.v),
            });
        }
        Ok(envelope)
    }
}
