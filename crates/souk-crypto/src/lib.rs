//! # Souk Crypto - Protocol Cryptographic Substrate
//!
//! Everything the event ledger hangs off: canonical serialization, hashing,
//! signatures, identifier derivation, and the envelope encryption used by
//! the key vault.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `canonical` | JCS-like JSON | Hash/signature preimages |
//! | `hashing` | SHA-256 | Event hashes, snapshot integrity |
//! | `signatures` | Ed25519 | Event and peer envelope signing |
//! | `identity` | multibase + SHA-256 | DID and wallet address derivation |
//! | `symmetric` | AES-256-GCM | Key record encryption |
//! | `exchange` | X25519 + HKDF-SHA256 | Sealed key envelopes |
//!
//! ## Determinism
//!
//! The whole protocol leans on two properties established here:
//!
//! - `canonical::canonicalize` produces byte-identical output for equal
//!   values on every platform.
//! - Ed25519 signatures are deterministic, so re-signing a finalized
//!   envelope yields the identical signature.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod errors;
pub mod exchange;
pub mod hashing;
pub mod identity;
pub mod signatures;
pub mod symmetric;

// Re-exports
pub use canonical::canonicalize;
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_hex, Sha256Hasher};
pub use identity::{
    address_from_did, decode_public_key, did_from_public_key, encode_public_key,
    public_key_from_did, Address, Did,
};
pub use signatures::{Keypair, PublicKey, Signature};
pub use symmetric::{open, seal, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
