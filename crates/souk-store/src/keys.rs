//! # Persisted Key Layout
//!
//! All state lives under five prefixes:
//!
//! ```text
//! log/<rank>              -> checksummed log record (rank = 16 hex digits)
//! hash_index/<hash>       -> rank
//! resource_head/<kind>/<id> -> event hash
//! snapshot/<hash>         -> snapshot bytes
//! meta/next_rank          -> next insertion rank
//! meta/last_applied       -> hash of the last applied event
//! meta/latest_snapshot    -> descriptor of the newest snapshot
//! ```
//!
//! Ranks are zero-padded hex so byte-order key scans iterate the log in
//! insertion order.

use souk_types::ResourceKind;

/// Prefix for log records.
pub const LOG_PREFIX: &[u8] = b"log/";
/// Prefix for the hash index.
pub const HASH_INDEX_PREFIX: &[u8] = b"hash_index/";
/// Prefix for resource heads.
pub const RESOURCE_HEAD_PREFIX: &[u8] = b"resource_head/";
/// Prefix for snapshots.
pub const SNAPSHOT_PREFIX: &[u8] = b"snapshot/";
/// Key holding the next insertion rank.
pub const META_NEXT_RANK: &[u8] = b"meta/next_rank";
/// Key holding the hash of the last applied event.
pub const META_LAST_APPLIED: &[u8] = b"meta/last_applied";
/// Key holding the latest snapshot descriptor.
pub const META_LATEST_SNAPSHOT: &[u8] = b"meta/latest_snapshot";

/// Width of the zero-padded hex rank.
pub const RANK_WIDTH: usize = 16;

/// Encode a rank as its fixed-width hex cursor form.
#[must_use]
pub fn encode_rank(rank: u64) -> String {
    format!("{rank:016x}")
}

/// Decode a cursor back to a rank.
#[must_use]
pub fn decode_rank(cursor: &str) -> Option<u64> {
    if cursor.len() != RANK_WIDTH {
        return None;
    }
    u64::from_str_radix(cursor, 16).ok()
}

/// Log record key for a rank.
#[must_use]
pub fn log_key(rank: u64) -> Vec<u8> {
    let mut key = LOG_PREFIX.to_vec();
    key.extend_from_slice(encode_rank(rank).as_bytes());
    key
}

/// Hash index key for an event hash.
#[must_use]
pub fn hash_index_key(hash: &str) -> Vec<u8> {
    let mut key = HASH_INDEX_PREFIX.to_vec();
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Head key for a resource.
#[must_use]
pub fn resource_head_key(kind: ResourceKind, id: &str) -> Vec<u8> {
    let mut key = RESOURCE_HEAD_PREFIX.to_vec();
    key.extend_from_slice(kind.as_str().as_bytes());
    key.push(b'/');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Snapshot key for a snapshot hash.
#[must_use]
pub fn snapshot_key(hash: &str) -> Vec<u8> {
    let mut key = SNAPSHOT_PREFIX.to_vec();
    key.extend_from_slice(hash.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_roundtrip() {
        for rank in [0u64, 1, 255, u64::MAX] {
            assert_eq!(decode_rank(&encode_rank(rank)), Some(rank));
        }
    }

    #[test]
    fn test_rank_ordering_matches_byte_ordering() {
        let a = encode_rank(9);
        let b = encode_rank(10);
        let c = encode_rank(0x1_0000);
        assert!(a.as_bytes() < b.as_bytes());
        assert!(b.as_bytes() < c.as_bytes());
    }

    #[test]
    fn test_bad_cursor_rejected() {
        assert!(decode_rank("xyz").is_none());
        assert!(decode_rank("12").is_none());
        assert!(decode_rank("00000000000000000f").is_none());
    }

    #[test]
    fn test_head_key_shape() {
        let key = resource_head_key(ResourceKind::Order, "ord-1");
        assert_eq!(key, b"resource_head/order/ord-1".to_vec());
    }
}
