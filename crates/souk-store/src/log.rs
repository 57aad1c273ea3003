//! # Event Store Service
//!
//! Append-only log with atomic resource-head updates and snapshot
//! persistence. Appends are single-writer by construction (`&mut self`);
//! the node serializes all writes behind one lock.

use serde::{Deserialize, Serialize};
use souk_crypto::sha256_hex;
use souk_types::{EventHash, ResourceKind};
use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::keys;
use crate::ports::{BatchOperation, KeyValueStore};

/// A resource-head compare-and-set applied atomically with an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadUpdate {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource id.
    pub id: String,
    /// Head after the append: the new event's hash.
    pub new_head: EventHash,
    /// Head the appender observed; `None` for chain-opening events.
    pub expected_prev: Option<EventHash>,
}

/// Result of an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The event was appended at this rank.
    Appended {
        /// Insertion rank.
        rank: u64,
    },
    /// The hash was already in the log; nothing changed.
    AlreadyPresent,
}

/// A batch of events from range iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBatch {
    /// Canonical wire bytes of each event, in insertion order.
    pub events: Vec<Vec<u8>>,
    /// Cursor for the next batch; `None` when the log is exhausted.
    pub next_cursor: Option<String>,
}

/// On-disk log record: the event bytes plus integrity metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogRecord {
    /// CRC32 of `bytes`, verified on every read.
    checksum: u32,
    /// Event hash (log primary key, duplicated here so pruning can clean
    /// the hash index without decoding event JSON).
    hash: String,
    /// Canonical event bytes exactly as appended.
    bytes: Vec<u8>,
}

/// Descriptor of the newest snapshot, stored under `meta/latest_snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDescriptor {
    hash: String,
    /// Rank of the first event NOT covered by the snapshot.
    next_rank: u64,
}

/// The event store: append-only log, hash index, resource heads, snapshots.
pub struct EventStore<K: KeyValueStore> {
    kv: K,
    next_rank: u64,
}

impl<K: KeyValueStore> EventStore<K> {
    /// Open the store, recovering the insertion rank from `meta/next_rank`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the meta record is undecodable.
    pub fn open(kv: K) -> Result<Self, StoreError> {
        let next_rank = match kv.get(keys::META_NEXT_RANK)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| StoreError::Corrupt {
                    message: "meta/next_rank is not 8 bytes".to_string(),
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        Ok(Self { kv, next_rank })
    }

    /// Rank the next append will receive.
    #[must_use]
    pub fn next_rank(&self) -> u64 {
        self.next_rank
    }

    /// True if an event with this hash is in the log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on adapter failure.
    pub fn contains(&self, hash: &str) -> Result<bool, StoreError> {
        self.kv.contains(&keys::hash_index_key(hash))
    }

    /// Append event bytes with atomic head updates.
    ///
    /// If any `expected_prev` does not match the recorded head, nothing is
    /// written and [`StoreError::ResourcePrevConflict`] is returned. A hash
    /// already present is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::ResourcePrevConflict`] on a head mismatch;
    /// [`StoreError::Io`] on adapter failure.
    pub fn append(
        &mut self,
        bytes: &[u8],
        hash: &str,
        head_updates: &[HeadUpdate],
    ) -> Result<AppendOutcome, StoreError> {
        if self.contains(hash)? {
            debug!(hash, "append skipped: hash already in log");
            return Ok(AppendOutcome::AlreadyPresent);
        }

        // Validate every CAS before writing anything
        for update in head_updates {
            let recorded = self.head(update.kind, &update.id)?;
            if recorded != update.expected_prev {
                warn!(
                    kind = %update.kind,
                    id = %update.id,
                    "head conflict: append aborted"
                );
                return Err(StoreError::ResourcePrevConflict {
                    kind: update.kind,
                    id: update.id.clone(),
                    expected: update.expected_prev.clone(),
                    recorded,
                });
            }
        }

        let rank = self.next_rank;
        let record = LogRecord {
            checksum: crc32fast::hash(bytes),
            hash: hash.to_string(),
            bytes: bytes.to_vec(),
        };
        let record_bytes = bincode::serialize(&record).map_err(|e| StoreError::Corrupt {
            message: e.to_string(),
        })?;

        let mut batch = vec![
            BatchOperation::put(keys::log_key(rank), record_bytes),
            BatchOperation::put(keys::hash_index_key(hash), rank.to_be_bytes().to_vec()),
            BatchOperation::put(keys::META_NEXT_RANK, (rank + 1).to_be_bytes().to_vec()),
            BatchOperation::put(keys::META_LAST_APPLIED, hash.as_bytes().to_vec()),
        ];
        for update in head_updates {
            batch.push(BatchOperation::put(
                keys::resource_head_key(update.kind, &update.id),
                update.new_head.as_bytes().to_vec(),
            ));
        }

        self.kv.atomic_batch(batch)?;
        self.next_rank = rank + 1;

        debug!(hash, rank, heads = head_updates.len(), "event appended");
        Ok(AppendOutcome::Appended { rank })
    }

    /// Fetch event bytes by hash.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] on checksum or decode failure.
    pub fn get_by_hash(&self, hash: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(rank_bytes) = self.kv.get(&keys::hash_index_key(hash))? else {
            return Ok(None);
        };
        let arr: [u8; 8] = rank_bytes.as_slice().try_into().map_err(|_| StoreError::Corrupt {
            message: format!("hash index entry for {hash} is not 8 bytes"),
        })?;
        let rank = u64::from_be_bytes(arr);

        match self.kv.get(&keys::log_key(rank))? {
            Some(record_bytes) => Ok(Some(Self::decode_record(&record_bytes)?.bytes)),
            None => Ok(None),
        }
    }

    /// Rank of an event by hash, used to translate hash cursors.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on adapter failure.
    pub fn rank_of(&self, hash: &str) -> Result<Option<u64>, StoreError> {
        let Some(rank_bytes) = self.kv.get(&keys::hash_index_key(hash))? else {
            return Ok(None);
        };
        let arr: [u8; 8] = rank_bytes.as_slice().try_into().map_err(|_| StoreError::Corrupt {
            message: format!("hash index entry for {hash} is not 8 bytes"),
        })?;
        Ok(Some(u64::from_be_bytes(arr)))
    }

    /// Recorded head of a resource chain.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] if the stored head is not UTF-8.
    pub fn head(&self, kind: ResourceKind, id: &str) -> Result<Option<EventHash>, StoreError> {
        match self.kv.get(&keys::resource_head_key(kind, id))? {
            Some(bytes) => {
                let hash = String::from_utf8(bytes).map_err(|_| StoreError::Corrupt {
                    message: format!("head for {kind}/{id} is not UTF-8"),
                })?;
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }

    /// Hash of the last applied event, if any.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] if the stored hash is not UTF-8.
    pub fn last_applied(&self) -> Result<Option<EventHash>, StoreError> {
        match self.kv.get(keys::META_LAST_APPLIED)? {
            Some(bytes) => {
                let hash = String::from_utf8(bytes).map_err(|_| StoreError::Corrupt {
                    message: "meta/last_applied is not UTF-8".to_string(),
                })?;
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }

    /// Iterate a slice of the log.
    ///
    /// The batch is truncated by whichever of `limit` (event count) and
    /// `max_bytes` (summed event size) binds first; at least one event is
    /// returned if any is available so oversized single events cannot stall
    /// a catch-up. `limit = 0` returns an empty batch and no cursor.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] on checksum or decode failure.
    pub fn range(
        &self,
        cursor: Option<&str>,
        limit: usize,
        max_bytes: usize,
    ) -> Result<RangeBatch, StoreError> {
        if limit == 0 {
            return Ok(RangeBatch {
                events: Vec::new(),
                next_cursor: cursor.map(str::to_string),
            });
        }

        let start_rank = match cursor {
            Some(c) => keys::decode_rank(c).ok_or_else(|| StoreError::Corrupt {
                message: format!("bad range cursor: {c}"),
            })?,
            None => 0,
        };

        // Fetch one extra entry to learn whether the log continues
        let entries = self.kv.scan_prefix(
            keys::LOG_PREFIX,
            Some(&keys::log_key(start_rank)),
            limit.saturating_add(1),
        )?;

        let mut events = Vec::new();
        let mut total_bytes = 0usize;
        let mut next_rank = None;

        for (key, record_bytes) in &entries {
            let rank = Self::rank_from_key(key)?;
            if events.len() >= limit {
                next_rank = Some(rank);
                break;
            }

            let record = Self::decode_record(record_bytes)?;
            if !events.is_empty() && total_bytes + record.bytes.len() > max_bytes {
                next_rank = Some(rank);
                break;
            }

            total_bytes += record.bytes.len();
            events.push(record.bytes);
        }

        Ok(RangeBatch {
            events,
            next_cursor: next_rank.map(keys::encode_rank),
        })
    }

    /// Persist a snapshot after verifying its hash.
    ///
    /// `covered_next_rank` is the rank of the first event not folded into
    /// the snapshot; range requests below it are served snapshot-first.
    ///
    /// # Errors
    ///
    /// [`StoreError::SnapshotHashMismatch`] if `hash` is not the SHA-256 of
    /// `snapshot_bytes`.
    pub fn save_snapshot(
        &mut self,
        snapshot_bytes: &[u8],
        hash: &str,
        covered_next_rank: u64,
    ) -> Result<(), StoreError> {
        let computed = sha256_hex(snapshot_bytes);
        if computed != hash {
            return Err(StoreError::SnapshotHashMismatch {
                claimed: hash.to_string(),
                computed,
            });
        }

        let descriptor = SnapshotDescriptor {
            hash: hash.to_string(),
            next_rank: covered_next_rank,
        };
        let descriptor_bytes =
            serde_json::to_vec(&descriptor).map_err(|e| StoreError::Corrupt {
                message: e.to_string(),
            })?;

        self.kv.atomic_batch(vec![
            BatchOperation::put(keys::snapshot_key(hash), snapshot_bytes.to_vec()),
            BatchOperation::put(keys::META_LATEST_SNAPSHOT, descriptor_bytes),
        ])?;

        debug!(hash, covered_next_rank, "snapshot saved");
        Ok(())
    }

    /// Load the newest snapshot, if any. Returns `(bytes, hash)`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] if the stored snapshot no longer matches its
    /// recorded hash.
    pub fn load_latest_snapshot(&self) -> Result<Option<(Vec<u8>, EventHash)>, StoreError> {
        let Some(descriptor) = self.latest_snapshot_descriptor()? else {
            return Ok(None);
        };

        let Some(bytes) = self.kv.get(&keys::snapshot_key(&descriptor.hash))? else {
            return Err(StoreError::Corrupt {
                message: format!("latest snapshot {} missing", descriptor.hash),
            });
        };

        if sha256_hex(&bytes) != descriptor.hash {
            return Err(StoreError::Corrupt {
                message: format!("snapshot {} failed hash verification", descriptor.hash),
            });
        }

        Ok(Some((bytes, descriptor.hash)))
    }

    /// Rank of the first event not covered by the latest snapshot, if one
    /// exists.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] on an undecodable descriptor.
    pub fn snapshot_next_rank(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.latest_snapshot_descriptor()?.map(|d| d.next_rank))
    }

    /// Seed the resource-head table and `meta/last_applied` from a restored
    /// snapshot, so post-snapshot appends chain against the heads the
    /// snapshot state recorded. Entries are `("kind/id", head_hash)` pairs.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on adapter failure.
    pub fn seed_resource_heads<I, S>(
        &mut self,
        entries: I,
        last_applied: Option<&str>,
    ) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut batch: Vec<BatchOperation> = entries
            .into_iter()
            .map(|(key_suffix, hash)| {
                let mut key = keys::RESOURCE_HEAD_PREFIX.to_vec();
                key.extend_from_slice(key_suffix.as_ref().as_bytes());
                BatchOperation::put(key, hash.as_ref().as_bytes().to_vec())
            })
            .collect();
        if let Some(hash) = last_applied {
            batch.push(BatchOperation::put(
                keys::META_LAST_APPLIED,
                hash.as_bytes().to_vec(),
            ));
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.kv.atomic_batch(batch)
    }

    /// Advance `meta/next_rank` to at least `rank`. Called after restoring
    /// a snapshot so a light node's local ranks continue past the log
    /// positions the snapshot already covers.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on adapter failure.
    pub fn align_next_rank(&mut self, rank: u64) -> Result<(), StoreError> {
        if rank > self.next_rank {
            self.kv
                .put(keys::META_NEXT_RANK, &rank.to_be_bytes())?;
            self.next_rank = rank;
        }
        Ok(())
    }

    /// Light-node pruning: drop log entries below `rank` (exclusive) after
    /// a snapshot restore. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] on undecodable records.
    pub fn prune_up_to(&mut self, rank: u64) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        loop {
            let entries = self.kv.scan_prefix(keys::LOG_PREFIX, None, 256)?;
            let mut batch = Vec::new();
            for (key, record_bytes) in &entries {
                if Self::rank_from_key(key)? >= rank {
                    continue;
                }
                let record = Self::decode_record(record_bytes)?;
                batch.push(BatchOperation::delete(key.clone()));
                batch.push(BatchOperation::delete(keys::hash_index_key(&record.hash)));
            }
            if batch.is_empty() {
                break;
            }
            removed += (batch.len() / 2) as u64;
            self.kv.atomic_batch(batch)?;
        }
        if removed > 0 {
            debug!(removed, below_rank = rank, "log pruned");
        }
        Ok(removed)
    }

    fn latest_snapshot_descriptor(&self) -> Result<Option<SnapshotDescriptor>, StoreError> {
        match self.kv.get(keys::META_LATEST_SNAPSHOT)? {
            Some(bytes) => {
                let descriptor =
                    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                        message: format!("bad snapshot descriptor: {e}"),
                    })?;
                Ok(Some(descriptor))
            }
            None => Ok(None),
        }
    }

    fn decode_record(record_bytes: &[u8]) -> Result<LogRecord, StoreError> {
        let record: LogRecord =
            bincode::deserialize(record_bytes).map_err(|e| StoreError::Corrupt {
                message: format!("bad log record: {e}"),
            })?;
        let checksum = crc32fast::hash(&record.bytes);
        if checksum != record.checksum {
            return Err(StoreError::Corrupt {
                message: format!(
                    "checksum mismatch for {}: stored {}, computed {}",
                    record.hash, record.checksum, checksum
                ),
            });
        }
        Ok(record)
    }

    fn rank_from_key(key: &[u8]) -> Result<u64, StoreError> {
        let suffix = key
            .strip_prefix(keys::LOG_PREFIX)
            .and_then(|s| std::str::from_utf8(s).ok())
            .ok_or_else(|| StoreError::Corrupt {
                message: "malformed log key".to_string(),
            })?;
        keys::decode_rank(suffix).ok_or_else(|| StoreError::Corrupt {
            message: format!("malformed log rank: {suffix}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryKvStore;

    fn store() -> EventStore<MemoryKvStore> {
        EventStore::open(MemoryKvStore::new()).unwrap()
    }

    fn head_update(id: &str, new_head: &str, expected_prev: Option<&str>) -> HeadUpdate {
        HeadUpdate {
            kind: ResourceKind::Contract,
            id: id.to_string(),
            new_head: new_head.to_string(),
            expected_prev: expected_prev.map(str::to_string),
        }
    }

    #[test]
    fn test_append_and_fetch_by_hash() {
        let mut store = store();
        let outcome = store.append(b"{\"e\":1}", "h1", &[]).unwrap();

        assert_eq!(outcome, AppendOutcome::Appended { rank: 0 });
        assert!(store.contains("h1").unwrap());
        assert_eq!(store.get_by_hash("h1").unwrap(), Some(b"{\"e\":1}".to_vec()));
        assert_eq!(store.last_applied().unwrap(), Some("h1".to_string()));
    }

    #[test]
    fn test_duplicate_hash_is_noop() {
        let mut store = store();
        store.append(b"{\"e\":1}", "h1", &[]).unwrap();
        let outcome = store.append(b"{\"e\":1}", "h1", &[]).unwrap();

        assert_eq!(outcome, AppendOutcome::AlreadyPresent);
        assert_eq!(store.next_rank(), 1);
    }

    #[test]
    fn test_head_cas_conflict_aborts_append() {
        let mut store = store();
        store
            .append(b"{\"e\":1}", "h0", &[head_update("c-1", "h0", None)])
            .unwrap();
        store
            .append(b"{\"e\":2}", "h1", &[head_update("c-1", "h1", Some("h0"))])
            .unwrap();

        // Second signer raced on the same predecessor
        let result = store.append(b"{\"e\":3}", "h2", &[head_update("c-1", "h2", Some("h0"))]);
        assert!(matches!(
            result,
            Err(StoreError::ResourcePrevConflict { .. })
        ));

        // Log untouched: no h2 anywhere, head still h1
        assert!(!store.contains("h2").unwrap());
        assert_eq!(store.next_rank(), 2);
        assert_eq!(
            store.head(ResourceKind::Contract, "c-1").unwrap(),
            Some("h1".to_string())
        );

        // Retry against the observed head succeeds
        store
            .append(b"{\"e\":3}", "h2", &[head_update("c-1", "h2", Some("h1"))])
            .unwrap();
    }

    #[test]
    fn test_range_pagination() {
        let mut store = store();
        for i in 0..10u32 {
            store
                .append(format!("{{\"e\":{i}}}").as_bytes(), &format!("h{i}"), &[])
                .unwrap();
        }

        let first = store.range(None, 5, usize::MAX).unwrap();
        assert_eq!(first.events.len(), 5);
        let cursor = first.next_cursor.unwrap();

        let second = store.range(Some(&cursor), 5, usize::MAX).unwrap();
        assert_eq!(second.events.len(), 5);
        assert_eq!(second.next_cursor, None);

        assert_eq!(second.events[4], b"{\"e\":9}".to_vec());
    }

    #[test]
    fn test_range_byte_bound() {
        let mut store = store();
        for i in 0..4u32 {
            store
                .append(format!("{{\"e\":{i}}}").as_bytes(), &format!("h{i}"), &[])
                .unwrap();
        }

        // Each event is 7 bytes; a 15-byte budget fits two
        let batch = store.range(None, 10, 15).unwrap();
        assert_eq!(batch.events.len(), 2);
        assert!(batch.next_cursor.is_some());
    }

    #[test]
    fn test_range_zero_limit() {
        let mut store = store();
        store.append(b"{\"e\":0}", "h0", &[]).unwrap();

        let batch = store.range(None, 0, usize::MAX).unwrap();
        assert!(batch.events.is_empty());
        assert_eq!(batch.next_cursor, None);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut store = store();
        let snapshot = b"snapshot state bytes".to_vec();
        let hash = sha256_hex(&snapshot);

        store.save_snapshot(&snapshot, &hash, 42).unwrap();

        let (loaded, loaded_hash) = store.load_latest_snapshot().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded_hash, hash);
        assert_eq!(store.snapshot_next_rank().unwrap(), Some(42));
    }

    #[test]
    fn test_snapshot_bad_hash_rejected() {
        let mut store = store();
        let result = store.save_snapshot(b"bytes", "deadbeef", 0);
        assert!(matches!(
            result,
            Err(StoreError::SnapshotHashMismatch { .. })
        ));
        assert!(store.load_latest_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_prune_below_snapshot() {
        let mut store = store();
        for i in 0..6u32 {
            store
                .append(format!("{{\"e\":{i}}}").as_bytes(), &format!("h{i}"), &[])
                .unwrap();
        }

        let removed = store.prune_up_to(4).unwrap();
        assert_eq!(removed, 4);

        assert!(!store.contains("h0").unwrap());
        assert!(store.contains("h4").unwrap());

        // Range from genesis now starts at the first surviving record
        let batch = store.range(None, 10, usize::MAX).unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0], b"{\"e\":4}".to_vec());
    }

    #[test]
    fn test_reopen_recovers_rank() {
        let mut kv = MemoryKvStore::new();
        {
            let mut store = EventStore::open(&mut kv).unwrap();
            store.append(b"{\"e\":0}", "h0", &[]).unwrap();
            store.append(b"{\"e\":1}", "h1", &[]).unwrap();
        }
        let store = EventStore::open(&mut kv).unwrap();
        assert_eq!(store.next_rank(), 2);
    }
}
