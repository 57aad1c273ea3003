//! # Key Vault
//!
//! Signing keys at rest: a [`KeyRecord`] seals an Ed25519 seed under a
//! passphrase (HKDF-SHA256 stretches the passphrase with a random salt;
//! AES-256-GCM seals the seed). The vault itself is a port - hosts load
//! records from wherever they keep them; an in-memory implementation
//! covers tests and ephemeral nodes.

use serde::{Deserialize, Serialize};
use souk_crypto::{exchange, symmetric, Keypair};
use souk_types::{BoundaryError, ErrorCode};
use std::collections::BTreeMap;

/// Domain separation for passphrase stretching.
const VAULT_INFO: &[u8] = b"souk/key-vault/v1";

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// A passphrase-sealed signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Caller-chosen key identifier.
    pub key_id: String,
    /// Random salt for passphrase stretching.
    pub salt: Vec<u8>,
    /// AES-GCM nonce.
    pub nonce: [u8; 12],
    /// Sealed 32-byte seed.
    pub ciphertext: Vec<u8>,
}

/// Loads sealed key records by id.
pub trait KeyVault: Send + Sync {
    /// Fetch a record, if present.
    fn load_key_record(&self, key_id: &str) -> Option<KeyRecord>;
}

/// In-memory vault for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct InMemoryKeyVault {
    records: BTreeMap<String, KeyRecord>,
}

impl InMemoryKeyVault {
    /// Create an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record.
    pub fn insert(&mut self, record: KeyRecord) {
        self.records.insert(record.key_id.clone(), record);
    }
}

impl KeyVault for InMemoryKeyVault {
    fn load_key_record(&self, key_id: &str) -> Option<KeyRecord> {
        self.records.get(key_id).cloned()
    }
}

/// Seal a keypair's seed under a passphrase.
///
/// # Errors
///
/// `CRYPTO_INVALID_KEY` if sealing fails.
pub fn seal_key_record(
    key_id: impl Into<String>,
    keypair: &Keypair,
    passphrase: &str,
) -> Result<KeyRecord, BoundaryError> {
    let mut salt = [0u8; SALT_LEN];
    rand_fill(&mut salt);

    let key = stretch(passphrase, &salt)?;
    let (ciphertext, nonce) = symmetric::seal(&key, &keypair.to_seed())
        .map_err(|e| BoundaryError::new(ErrorCode::CryptoInvalidKey, e.to_string()))?;

    Ok(KeyRecord {
        key_id: key_id.into(),
        salt: salt.to_vec(),
        nonce,
        ciphertext,
    })
}

/// Open a sealed record with its passphrase, recovering the keypair.
///
/// # Errors
///
/// `CRYPTO_INVALID_KEY` on a wrong passphrase or tampered record.
pub fn decrypt_key_record(record: &KeyRecord, passphrase: &str) -> Result<Keypair, BoundaryError> {
    let key = stretch(passphrase, &record.salt)?;
    let seed_bytes = symmetric::open(&key, &record.ciphertext, &record.nonce)
        .map_err(|e| BoundaryError::new(ErrorCode::CryptoInvalidKey, e.to_string()))?;

    let seed: [u8; 32] = seed_bytes.as_slice().try_into().map_err(|_| {
        BoundaryError::new(ErrorCode::CryptoInvalidKey, "key record seed is not 32 bytes")
    })?;
    Ok(Keypair::from_seed(seed))
}

fn stretch(passphrase: &str, salt: &[u8]) -> Result<symmetric::SecretKey, BoundaryError> {
    let mut key_bytes = [0u8; 32];
    exchange::hkdf_sha256(passphrase.as_bytes(), salt, VAULT_INFO, &mut key_bytes)
        .map_err(|e| BoundaryError::new(ErrorCode::CryptoInvalidKey, e.to_string()))?;
    Ok(symmetric::SecretKey::from_bytes(key_bytes))
}

fn rand_fill(buf: &mut [u8]) {
    use rand::RngCore;
    rand::thread_rng().fill_bytes(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let keypair = Keypair::from_seed([7u8; 32]);
        let record = seal_key_record("node-key", &keypair, "hunter2").unwrap();

        let recovered = decrypt_key_record(&record, "hunter2").unwrap();
        assert_eq!(recovered.public_key(), keypair.public_key());
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let keypair = Keypair::from_seed([7u8; 32]);
        let record = seal_key_record("node-key", &keypair, "hunter2").unwrap();

        let error = decrypt_key_record(&record, "hunter3").unwrap_err();
        assert_eq!(error.code, ErrorCode::CryptoInvalidKey);
    }

    #[test]
    fn test_vault_load() {
        let keypair = Keypair::from_seed([8u8; 32]);
        let mut vault = InMemoryKeyVault::new();
        vault.insert(seal_key_record("k1", &keypair, "pw").unwrap());

        let record = vault.load_key_record("k1").unwrap();
        assert_eq!(record.key_id, "k1");
        assert!(vault.load_key_record("k2").is_none());
    }
}
