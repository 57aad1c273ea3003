//! # Key Exchange and Sealed Envelopes
//!
//! X25519 shared secrets, HKDF-SHA256 derivation, and the sealed key
//! envelope the vault uses to hand private key material between parties:
//! an ephemeral X25519 key agrees a shared secret with the recipient, HKDF
//! stretches it into an AES key, and AES-256-GCM seals the payload.

use crate::symmetric::{self, SecretKey, NONCE_LEN};
use crate::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519Public, StaticSecret};

/// Domain separation string for envelope key derivation.
const ENVELOPE_INFO: &[u8] = b"souk/key-envelope/v1";

/// Compute the X25519 shared secret between a static secret and a peer key.
pub fn x25519_shared_secret(secret: &StaticSecret, peer: &X25519Public) -> [u8; 32] {
    *secret.diffie_hellman(peer).as_bytes()
}

/// HKDF-SHA256: derive `out` from input key material, salt, and info.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if the requested length is invalid
/// for HKDF output.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    out: &mut [u8],
) -> Result<(), CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    hk.expand(info, out).map_err(|_| CryptoError::InvalidKey {
        reason: "hkdf output length invalid".to_string(),
    })
}

/// A sealed payload addressed to an X25519 public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEnvelope {
    /// Ephemeral sender public key.
    pub ephemeral: [u8; 32],
    /// AES-GCM nonce.
    pub nonce: [u8; NONCE_LEN],
    /// Sealed payload.
    pub ciphertext: Vec<u8>,
}

/// Seal `plaintext` to the holder of `recipient`.
///
/// # Errors
///
/// Returns [`CryptoError::EncryptionFailed`] if sealing fails.
pub fn seal_key_envelope(
    recipient: &X25519Public,
    plaintext: &[u8],
) -> Result<KeyEnvelope, CryptoError> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_public = X25519Public::from(&ephemeral_secret);

    let shared = ephemeral_secret.diffie_hellman(recipient);

    let mut key_bytes = [0u8; 32];
    hkdf_sha256(
        shared.as_bytes(),
        ephemeral_public.as_bytes(),
        ENVELOPE_INFO,
        &mut key_bytes,
    )?;

    let (ciphertext, nonce) = symmetric::seal(&SecretKey::from_bytes(key_bytes), plaintext)?;

    Ok(KeyEnvelope {
        ephemeral: *ephemeral_public.as_bytes(),
        nonce,
        ciphertext,
    })
}

/// Open an envelope with the recipient's static secret.
///
/// # Errors
///
/// Returns [`CryptoError::DecryptionFailed`] if the envelope was not
/// addressed to this secret or was tampered with.
pub fn open_key_envelope(
    recipient: &StaticSecret,
    envelope: &KeyEnvelope,
) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = X25519Public::from(envelope.ephemeral);
    let shared = recipient.diffie_hellman(&ephemeral);

    let mut key_bytes = [0u8; 32];
    hkdf_sha256(
        shared.as_bytes(),
        envelope.ephemeral.as_slice(),
        ENVELOPE_INFO,
        &mut key_bytes,
    )?;

    symmetric::open(
        &SecretKey::from_bytes(key_bytes),
        &envelope.ciphertext,
        &envelope.nonce,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_symmetric() {
        let a = StaticSecret::random_from_rng(rand::thread_rng());
        let b = StaticSecret::random_from_rng(rand::thread_rng());

        let a_pub = X25519Public::from(&a);
        let b_pub = X25519Public::from(&b);

        assert_eq!(
            x25519_shared_secret(&a, &b_pub),
            x25519_shared_secret(&b, &a_pub)
        );
    }

    #[test]
    fn test_hkdf_deterministic() {
        let mut out1 = [0u8; 32];
        let mut out2 = [0u8; 32];
        hkdf_sha256(b"ikm", b"salt", b"info", &mut out1).unwrap();
        hkdf_sha256(b"ikm", b"salt", b"info", &mut out2).unwrap();
        assert_eq!(out1, out2);

        let mut out3 = [0u8; 32];
        hkdf_sha256(b"ikm", b"salt", b"other", &mut out3).unwrap();
        assert_ne!(out1, out3);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let recipient = StaticSecret::random_from_rng(rand::thread_rng());
        let recipient_pub = X25519Public::from(&recipient);

        let envelope = seal_key_envelope(&recipient_pub, b"ed25519 seed bytes").unwrap();
        let opened = open_key_envelope(&recipient, &envelope).unwrap();

        assert_eq!(opened, b"ed25519 seed bytes");
    }

    #[test]
    fn test_envelope_wrong_recipient_fails() {
        let recipient = StaticSecret::random_from_rng(rand::thread_rng());
        let recipient_pub = X25519Public::from(&recipient);
        let other = StaticSecret::random_from_rng(rand::thread_rng());

        let envelope = seal_key_envelope(&recipient_pub, b"seed").unwrap();
        assert!(open_key_envelope(&other, &envelope).is_err());
    }
}
