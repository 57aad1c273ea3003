//! # Identifier Derivation
//!
//! Two deterministic identifiers hang off an Ed25519 public key:
//!
//! - **DID** — `did:souk:<multibase base58btc of the 32 key bytes>`. The
//!   public key is fully recoverable from the DID, which is what binds an
//!   envelope's `issuer` to its `pub` field.
//! - **Address** — the first 20 bytes of SHA-256 of the key, lowercase hex.
//!   Short form used by the wallet ledger.

use crate::errors::CryptoError;
use crate::hashing::sha256;
use crate::signatures::PublicKey;
use multibase::Base;

/// DID method name for the Souk protocol.
pub const DID_METHOD: &str = "souk";

/// Prefix every Souk DID starts with.
pub const DID_PREFIX: &str = "did:souk:";

/// Length of the address in bytes (before hex encoding).
pub const ADDRESS_LEN: usize = 20;

/// A decentralized identifier embedding an Ed25519 public key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Did(String);

impl Did {
    /// Wrap a pre-validated DID string.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidDid`] unless the string parses back to
    /// a valid public key.
    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        public_key_from_did(s)?;
        Ok(Self(s.to_string()))
    }

    /// The DID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the embedded public key.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        public_key_from_did(&self.0)
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A wallet ledger address.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(String);

impl Address {
    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a raw address string (for deserialized state).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the DID for a public key.
pub fn did_from_public_key(pk: &PublicKey) -> Did {
    let encoded = multibase::encode(Base::Base58Btc, pk.as_bytes());
    Did(format!("{DID_PREFIX}{encoded}"))
}

/// Recover the public key embedded in a DID.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidDid`] on a foreign method, bad multibase
/// payload, wrong key length, or an invalid curve point.
pub fn public_key_from_did(did: &str) -> Result<PublicKey, CryptoError> {
    let invalid = |reason: &str| CryptoError::InvalidDid {
        did: did.to_string(),
        reason: reason.to_string(),
    };

    let encoded = did
        .strip_prefix(DID_PREFIX)
        .ok_or_else(|| invalid("missing did:souk: prefix"))?;

    let (_base, bytes) =
        multibase::decode(encoded).map_err(|_| invalid("bad multibase payload"))?;

    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| invalid("key is not 32 bytes"))?;

    PublicKey::from_bytes(bytes).map_err(|_| invalid("not a valid Ed25519 point"))
}

/// Multibase-encode a public key (base58btc), the form carried in an
/// envelope's `pub` field.
pub fn encode_public_key(pk: &PublicKey) -> String {
    multibase::encode(Base::Base58Btc, pk.as_bytes())
}

/// Decode a multibase-encoded public key.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] on bad multibase data, wrong length,
/// or an invalid curve point.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let (_base, bytes) = multibase::decode(encoded).map_err(|_| CryptoError::InvalidKey {
        reason: "bad multibase payload".to_string(),
    })?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKey {
        reason: "key is not 32 bytes".to_string(),
    })?;
    PublicKey::from_bytes(bytes)
}

/// Derive the wallet address for a public key.
pub fn address_from_public_key(pk: &PublicKey) -> Address {
    let digest = sha256(pk.as_bytes());
    Address(hex::encode(&digest[..ADDRESS_LEN]))
}

/// Derive the wallet address embedded in a DID.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidDid`] if the DID does not parse.
pub fn address_from_did(did: &str) -> Result<Address, CryptoError> {
    let pk = public_key_from_did(did)?;
    Ok(address_from_public_key(&pk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::Keypair;

    #[test]
    fn test_did_roundtrip() {
        let keypair = Keypair::generate();
        let pk = keypair.public_key();

        let did = did_from_public_key(&pk);
        assert!(did.as_str().starts_with("did:souk:z"));

        let recovered = public_key_from_did(did.as_str()).unwrap();
        assert_eq!(pk, recovered);
    }

    #[test]
    fn test_foreign_method_rejected() {
        let result = public_key_from_did("did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK");
        assert!(matches!(result, Err(CryptoError::InvalidDid { .. })));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        assert!(public_key_from_did("did:souk:!!notbase58!!").is_err());
        assert!(public_key_from_did("did:souk:z3").is_err());
        assert!(public_key_from_did("plainstring").is_err());
    }

    #[test]
    fn test_address_is_deterministic_short_form() {
        let keypair = Keypair::from_seed([7u8; 32]);
        let did = did_from_public_key(&keypair.public_key());

        let a1 = address_from_did(did.as_str()).unwrap();
        let a2 = address_from_public_key(&keypair.public_key());

        assert_eq!(a1, a2);
        assert_eq!(a1.as_str().len(), ADDRESS_LEN * 2);
    }

    #[test]
    fn test_distinct_keys_distinct_addresses() {
        let a = address_from_public_key(&Keypair::from_seed([1u8; 32]).public_key());
        let b = address_from_public_key(&Keypair::from_seed([2u8; 32]).public_key());
        assert_ne!(a, b);
    }
}
