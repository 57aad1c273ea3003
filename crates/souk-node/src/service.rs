//! # Node Service - The Single-Writer State Path
//!
//! All mutations of the ledger flow through one place: a write-locked core
//! holding the event store and the reduced projections. Local publishes
//! and sync ingress share the same transactional apply:
//!
//! 1. The reducer runs against a working copy of the projections.
//! 2. On acceptance, the store appends log entry + head updates atomically.
//! 3. Only then does the working copy become the visible state.
//!
//! A reducer rejection or a head conflict therefore leaves both the log
//! and the projections exactly as they were. A storage I/O failure halts
//! the publish pipeline (the writer is poisoned); reads continue degraded.
//!
//! Startup rebuilds projections from the log, fast-forwarding through the
//! latest snapshot when one exists.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use souk_crypto::{sha256_hex, Keypair};
use souk_reducers::{LedgerState, MilestonePayout, Reducer};
use souk_store::{keys, AppendOutcome, EventStore, HeadUpdate, KeyValueStore, StoreError};
use souk_types::{
    BoundaryError, ErrorCode, EventEnvelope, EventHash, RangeResponse, SnapshotResponse,
};

use crate::config::NodeConfig;

/// What a snapshot's bytes decode to: the projections plus the log
/// position they cover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// The reduced projections.
    pub state: LedgerState,
    /// Rank of the first event NOT folded into this snapshot.
    pub next_rank: u64,
    /// Hash of the last folded event, if any.
    pub last_applied: Option<EventHash>,
}

/// Result of a successful local publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// The event's hash (the log key).
    pub hash: EventHash,
    /// Canonical wire bytes, ready for the events topic.
    pub bytes: Vec<u8>,
    /// Payout derived by a milestone approval, if any.
    pub payout: Option<MilestonePayout>,
    /// True when the hash was already in the log (idempotent no-op; no
    /// broadcast needed).
    pub duplicate: bool,
}

struct Core<K: KeyValueStore> {
    store: EventStore<K>,
    ledger: LedgerState,
}

/// The node's state path. Single-writer: every mutation takes the write
/// lock; readers see consistent projections as of their call.
pub struct NodeService<K: KeyValueStore> {
    core: RwLock<Core<K>>,
    reducer: Reducer,
    config: NodeConfig,
    halted: AtomicBool,
}

impl<K: KeyValueStore> NodeService<K> {
    /// Open the node: recover the store, fast-forward through the latest
    /// snapshot, and replay the remaining log into fresh projections.
    ///
    /// # Errors
    ///
    /// Returns a [`BoundaryError`] with a storage code when recovery
    /// fails.
    pub fn open(kv: K, reducer: Reducer, config: NodeConfig) -> Result<Self, BoundaryError> {
        let store = EventStore::open(kv).map_err(BoundaryError::from)?;
        let mut ledger = LedgerState::new();
        let mut replay_cursor: Option<String> = None;

        if let Some((bytes, hash)) = store.load_latest_snapshot().map_err(BoundaryError::from)? {
            let payload: SnapshotPayload =
                serde_json::from_slice(&bytes).map_err(|e| {
                    BoundaryError::new(ErrorCode::StoreCorrupt, format!("snapshot {hash}: {e}"))
                })?;
            info!(hash = %hash, next_rank = payload.next_rank, "snapshot fast-forward");
            ledger = payload.state;
            replay_cursor = Some(keys::encode_rank(payload.next_rank));
        }

        let service = Self {
            core: RwLock::new(Core { store, ledger }),
            reducer,
            config,
            halted: AtomicBool::new(false),
        };
        service.replay_tail(replay_cursor)?;
        Ok(service)
    }

    /// Replay log entries from `cursor` into the projections.
    fn replay_tail(&self, mut cursor: Option<String>) -> Result<(), BoundaryError> {
        let mut core = self.core.write();
        let mut replayed = 0u64;

        loop {
            let batch = core
                .store
                .range(cursor.as_deref(), 1024, usize::MAX)
                .map_err(BoundaryError::from)?;

            for bytes in &batch.events {
                let envelope = match EventEnvelope::from_wire_bytes(bytes) {
                    Ok(envelope) => envelope,
                    Err(error) => {
                        warn!(error = %error, "undecodable log entry skipped during replay");
                        continue;
                    }
                };
                if let Err(error) = self.reducer.apply(&mut core.ledger, &envelope) {
                    warn!(
                        hash = %envelope.hash,
                        error = %error,
                        "log entry rejected during replay"
                    );
                    continue;
                }
                replayed += 1;
            }

            match batch.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if replayed > 0 {
            info!(replayed, "projections rebuilt from log");
        }
        Ok(())
    }

    /// Client-facing publish: validate, sign if unsigned, apply, append.
    /// Broadcasting the returned bytes is the caller's step (best-effort;
    /// the event is already committed).
    ///
    /// # Errors
    ///
    /// The first failed step terminates the call; reducer errors come back
    /// verbatim as their boundary codes.
    pub fn publish_local(
        &self,
        envelope: EventEnvelope,
        signer: Option<&Keypair>,
    ) -> Result<PublishOutcome, BoundaryError> {
        self.check_writer()?;

        // Sign with the caller-identified key if the envelope is unsigned
        let envelope = if envelope.is_finalized() {
            envelope
        } else {
            let signer = signer.ok_or_else(|| {
                BoundaryError::new(
                    ErrorCode::EventSignatureInvalid,
                    "unsigned envelope and no signing key",
                )
            })?;
            envelope.finalize(signer).map_err(BoundaryError::from)?
        };

        envelope
            .check_size(self.config.max_event_size)
            .map_err(BoundaryError::from)?;

        // Recompute the hash; a finalized envelope must carry the right one
        let computed = envelope.compute_hash().map_err(BoundaryError::from)?;
        if computed != envelope.hash {
            return Err(BoundaryError::new(
                ErrorCode::EventHashMismatch,
                format!("recorded {}, computed {computed}", envelope.hash),
            ));
        }

        self.apply_and_append(&envelope)
    }

    /// Sync-ingress apply: decode wire bytes and run the shared
    /// transactional path. Duplicates are fine (gossip redelivers).
    ///
    /// # Errors
    ///
    /// Per-event; the caller's batch continues.
    pub fn apply_remote(&self, bytes: &[u8]) -> Result<(), BoundaryError> {
        if bytes.len() > self.config.max_event_size {
            return Err(BoundaryError::new(
                ErrorCode::EventTooLarge,
                format!("{} bytes, max {}", bytes.len(), self.config.max_event_size),
            ));
        }
        let envelope = EventEnvelope::from_wire_bytes(bytes).map_err(BoundaryError::from)?;
        self.apply_and_append(&envelope).map(|_| ())
    }

    /// The shared transactional apply: reducer on a working copy, atomic
    /// append, then commit the copy.
    fn apply_and_append(&self, envelope: &EventEnvelope) -> Result<PublishOutcome, BoundaryError> {
        let mut core = self.core.write();

        let bytes = envelope.to_wire_bytes().map_err(BoundaryError::from)?;

        if core.store.contains(&envelope.hash).map_err(BoundaryError::from)? {
            debug!(hash = %envelope.hash, "duplicate publish: idempotent no-op");
            return Ok(PublishOutcome {
                hash: envelope.hash.clone(),
                bytes,
                payout: None,
                duplicate: true,
            });
        }

        let mut next = core.ledger.clone();
        let applied = self
            .reducer
            .apply(&mut next, envelope)
            .map_err(BoundaryError::from)?;

        let head_updates: Vec<HeadUpdate> = applied
            .head_updates
            .iter()
            .map(|h| HeadUpdate {
                kind: h.kind,
                id: h.id.clone(),
                new_head: h.new_head.clone(),
                expected_prev: h.expected_prev.clone(),
            })
            .collect();

        match core.store.append(&bytes, &envelope.hash, &head_updates) {
            Ok(AppendOutcome::Appended { rank }) => {
                core.ledger = next;
                debug!(hash = %envelope.hash, rank, "event committed");

                if let Some(every) = self.config.snapshot_every {
                    if every > 0 && (rank + 1) % every == 0 {
                        if let Err(error) = Self::snapshot_locked(&mut core) {
                            warn!(error = %error, "periodic snapshot failed");
                        }
                    }
                }

                Ok(PublishOutcome {
                    hash: envelope.hash.clone(),
                    bytes,
                    payout: applied.payout,
                    duplicate: false,
                })
            }
            Ok(AppendOutcome::AlreadyPresent) => Ok(PublishOutcome {
                hash: envelope.hash.clone(),
                bytes,
                payout: None,
                duplicate: true,
            }),
            Err(error @ StoreError::Io { .. }) => {
                // Storage failure poisons the writer; reads go on degraded
                self.halted.store(true, Ordering::SeqCst);
                warn!(error = %error, "storage failure: publish pipeline halted");
                Err(BoundaryError::from(error))
            }
            Err(error) => Err(BoundaryError::from(error)),
        }
    }

    /// Serve a log slice. `from` accepts an opaque cursor from a previous
    /// batch or an event hash to resume after (the snapshot hand-off
    /// path).
    ///
    /// # Errors
    ///
    /// Storage codes only; an unknown `from` yields an empty batch.
    pub fn serve_range(
        &self,
        from: Option<&str>,
        limit: usize,
        max_bytes: usize,
    ) -> Result<RangeResponse, BoundaryError> {
        let core = self.core.read();

        let cursor: Option<String> = match from {
            None => None,
            Some(token) => {
                if keys::decode_rank(token).is_some() {
                    Some(token.to_string())
                } else if let Some(rank) =
                    core.store.rank_of(token).map_err(BoundaryError::from)?
                {
                    // A hash: resume just past it
                    Some(keys::encode_rank(rank + 1))
                } else {
                    return Ok(RangeResponse {
                        events: Vec::new(),
                        next_cursor: None,
                    });
                }
            }
        };

        let batch = core
            .store
            .range(cursor.as_deref(), limit, max_bytes)
            .map_err(BoundaryError::from)?;
        Ok(RangeResponse {
            events: batch.events,
            next_cursor: batch.next_cursor,
        })
    }

    /// Take a snapshot of the current projections.
    ///
    /// # Errors
    ///
    /// Storage codes on persist failure.
    pub fn snapshot(&self) -> Result<SnapshotResponse, BoundaryError> {
        let mut core = self.core.write();
        Self::snapshot_locked(&mut core)
    }

    fn snapshot_locked(core: &mut Core<K>) -> Result<SnapshotResponse, BoundaryError> {
        let payload = SnapshotPayload {
            state: core.ledger.clone(),
            next_rank: core.store.next_rank(),
            last_applied: core.store.last_applied().map_err(BoundaryError::from)?,
        };
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| BoundaryError::new(ErrorCode::StoreCorrupt, e.to_string()))?;
        let hash = sha256_hex(&bytes);

        core.store
            .save_snapshot(&bytes, &hash, payload.next_rank)
            .map_err(BoundaryError::from)?;
        info!(hash = %hash, next_rank = payload.next_rank, "snapshot taken");

        Ok(SnapshotResponse {
            hash,
            snapshot: bytes,
        })
    }

    /// The latest persisted snapshot, if any.
    ///
    /// # Errors
    ///
    /// Storage codes on load failure.
    pub fn latest_snapshot(&self) -> Result<Option<SnapshotResponse>, BoundaryError> {
        let core = self.core.read();
        Ok(core
            .store
            .load_latest_snapshot()
            .map_err(BoundaryError::from)?
            .map(|(snapshot, hash)| SnapshotResponse { hash, snapshot }))
    }

    /// Restore a received snapshot (hash already verified by the caller):
    /// persist it, replace the projections, align ranks, and prune the
    /// covered log prefix. Light-node bootstrap.
    ///
    /// # Errors
    ///
    /// `STORE_CORRUPT` on an undecodable payload or hash mismatch.
    pub fn restore_snapshot(&self, hash: &str, bytes: &[u8]) -> Result<(), BoundaryError> {
        let payload: SnapshotPayload = serde_json::from_slice(bytes)
            .map_err(|e| BoundaryError::new(ErrorCode::StoreCorrupt, e.to_string()))?;

        let mut core = self.core.write();
        core.store
            .save_snapshot(bytes, hash, payload.next_rank)
            .map_err(BoundaryError::from)?;
        core.store
            .align_next_rank(payload.next_rank)
            .map_err(BoundaryError::from)?;
        let pruned = core
            .store
            .prune_up_to(payload.next_rank)
            .map_err(BoundaryError::from)?;
        // Post-snapshot appends chain against the heads the snapshot state
        // recorded, so the store's head table must agree with it
        core.store
            .seed_resource_heads(
                payload
                    .state
                    .heads
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
                payload.last_applied.as_deref(),
            )
            .map_err(BoundaryError::from)?;
        core.ledger = payload.state;

        info!(hash = %hash, next_rank = payload.next_rank, pruned, "snapshot restored");
        Ok(())
    }

    /// Read access to the projections; the closure sees a consistent
    /// snapshot as of the call.
    pub fn with_state<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        let core = self.core.read();
        f(&core.ledger)
    }

    /// Recorded head of a resource chain, for building chained envelopes.
    pub fn resource_head(
        &self,
        kind: souk_types::ResourceKind,
        id: &str,
    ) -> Option<EventHash> {
        self.with_state(|state| state.head(kind, id).cloned())
    }

    /// True once a storage failure has poisoned the writer.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn check_writer(&self) -> Result<(), BoundaryError> {
        if self.is_halted() {
            return Err(BoundaryError::new(
                ErrorCode::StoreIo,
                "publish pipeline halted after storage failure",
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<K: KeyValueStore + 'static> souk_sync::LedgerGateway for NodeService<K> {
    async fn apply_event_bytes(&self, bytes: &[u8]) -> Result<(), BoundaryError> {
        self.apply_remote(bytes)
    }

    async fn serve_range(
        &self,
        from: Option<String>,
        limit: u32,
        max_bytes: usize,
    ) -> Result<RangeResponse, BoundaryError> {
        NodeService::serve_range(self, from.as_deref(), limit as usize, max_bytes)
    }

    async fn latest_snapshot(&self) -> Result<Option<SnapshotResponse>, BoundaryError> {
        NodeService::latest_snapshot(self)
    }

    async fn restore_snapshot(&self, hash: &str, bytes: &[u8]) -> Result<(), BoundaryError> {
        NodeService::restore_snapshot(self, hash, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use souk_crypto::did_from_public_key;
    use souk_reducers::ReducerConfig;
    use souk_store::MemoryKvStore;
    use souk_types::TokenAmount;

    struct Actor {
        keypair: Keypair,
        did: String,
        address: String,
        nonce: u64,
    }

    impl Actor {
        fn new(seed: u8) -> Self {
            let keypair = Keypair::from_seed([seed; 32]);
            let did = did_from_public_key(&keypair.public_key())
                .as_str()
                .to_string();
            let address = souk_crypto::address_from_did(&did)
                .unwrap()
                .as_str()
                .to_string();
            Self {
                keypair,
                did,
                address,
                nonce: 0,
            }
        }

        fn unsigned(
            &mut self,
            event_type: &str,
            payload: serde_json::Value,
            ts: u64,
            resource_prev: Option<String>,
        ) -> EventEnvelope {
            self.nonce += 1;
            EventEnvelope::build(
                event_type,
                self.did.clone(),
                payload,
                ts,
                self.nonce,
                None,
                resource_prev,
                &self.keypair.public_key(),
            )
        }
    }

    fn node_with_minter(minter: &Actor) -> NodeService<MemoryKvStore> {
        let mut config = ReducerConfig::default();
        config.mint_authorities.insert(minter.did.clone());
        NodeService::open(
            MemoryKvStore::new(),
            Reducer::new(config),
            NodeConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_publish_signs_applies_and_returns_hash() {
        let mut minter = Actor::new(1);
        let alice = Actor::new(2);
        let node = node_with_minter(&minter);

        let envelope = minter.unsigned(
            "wallet.mint",
            json!({"to": alice.address, "amount": 1000}),
            1,
            None,
        );
        let outcome = node
            .publish_local(envelope, Some(&minter.keypair))
            .unwrap();

        assert!(!outcome.duplicate);
        assert!(!outcome.hash.is_empty());
        assert_eq!(
            node.with_state(|s| s.wallet.balance(&alice.address)),
            TokenAmount::from_u64(1000)
        );
    }

    #[test]
    fn test_duplicate_hash_is_idempotent() {
        let mut minter = Actor::new(1);
        let alice = Actor::new(2);
        let node = node_with_minter(&minter);

        let envelope = minter
            .unsigned(
                "wallet.mint",
                json!({"to": alice.address, "amount": 10}),
                1,
                None,
            )
            .finalize(&minter.keypair)
            .unwrap();

        let first = node.publish_local(envelope.clone(), None).unwrap();
        let second = node.publish_local(envelope, None).unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.hash, second.hash);
        assert_eq!(
            node.with_state(|s| s.wallet.balance(&alice.address)),
            TokenAmount::from_u64(10)
        );
    }

    #[test]
    fn test_reducer_rejection_persists_nothing() {
        let mut mallory = Actor::new(9);
        let node = NodeService::open(
            MemoryKvStore::new(),
            Reducer::default(),
            NodeConfig::default(),
        )
        .unwrap();

        let envelope = mallory.unsigned(
            "wallet.mint",
            json!({"to": mallory.address, "amount": 1000}),
            1,
            None,
        );
        let error = node
            .publish_local(envelope, Some(&mallory.keypair))
            .unwrap_err();

        assert_eq!(error.code, ErrorCode::UnauthorizedIssuer);
        let served = node.serve_range(None, 10, usize::MAX).unwrap();
        assert!(served.events.is_empty());
        assert_eq!(
            node.with_state(|s| s.wallet.balance(&mallory.address)),
            TokenAmount::zero()
        );
    }

    #[test]
    fn test_restart_rebuilds_projections() {
        let mut minter = Actor::new(1);
        let alice = Actor::new(2);
        let mut kv = MemoryKvStore::new();

        let mut config = ReducerConfig::default();
        config.mint_authorities.insert(minter.did.clone());

        {
            let node =
                NodeService::open(&mut kv, Reducer::new(config.clone()), NodeConfig::default())
                    .unwrap();
            let envelope = minter.unsigned(
                "wallet.mint",
                json!({"to": alice.address, "amount": 77}),
                1,
                None,
            );
            node.publish_local(envelope, Some(&minter.keypair)).unwrap();
        }

        let reopened =
            NodeService::open(&mut kv, Reducer::new(config), NodeConfig::default()).unwrap();
        assert_eq!(
            reopened.with_state(|s| s.wallet.balance(&alice.address)),
            TokenAmount::from_u64(77)
        );
    }

    #[test]
    fn test_snapshot_then_tail_equals_full_replay() {
        let mut minter = Actor::new(1);
        let alice = Actor::new(2);
        let node = node_with_minter(&minter);

        for i in 0..5u64 {
            let envelope = minter.unsigned(
                "wallet.mint",
                json!({"to": alice.address, "amount": 10}),
                i + 1,
                node.resource_head(souk_types::ResourceKind::Wallet, &minter.address),
            );
            node.publish_local(envelope, Some(&minter.keypair)).unwrap();
        }

        let snapshot = node.snapshot().unwrap();

        // Two more events after the snapshot
        for i in 5..7u64 {
            let envelope = minter.unsigned(
                "wallet.mint",
                json!({"to": alice.address, "amount": 10}),
                i + 1,
                node.resource_head(souk_types::ResourceKind::Wallet, &minter.address),
            );
            node.publish_local(envelope, Some(&minter.keypair)).unwrap();
        }
        let full_state = node.with_state(Clone::clone);

        // A light node restores the snapshot, then pulls the tail
        let light = NodeService::open(
            MemoryKvStore::new(),
            Reducer::new({
                let mut c = ReducerConfig::default();
                c.mint_authorities.insert(minter.did.clone());
                c
            }),
            NodeConfig::default(),
        )
        .unwrap();
        light
            .restore_snapshot(&snapshot.hash, &snapshot.snapshot)
            .unwrap();

        let payload: SnapshotPayload = serde_json::from_slice(&snapshot.snapshot).unwrap();
        let tail = node
            .serve_range(payload.last_applied.as_deref(), 100, usize::MAX)
            .unwrap();
        assert_eq!(tail.events.len(), 2);
        for bytes in &tail.events {
            light.apply_remote(bytes).unwrap();
        }

        assert_eq!(light.with_state(Clone::clone), full_state);
    }

    #[test]
    fn test_oversize_event_rejected_at_both_boundaries() {
        let mut minter = Actor::new(1);
        let node = NodeService::open(
            MemoryKvStore::new(),
            Reducer::default(),
            NodeConfig {
                max_event_size: 256,
                snapshot_every: None,
            },
        )
        .unwrap();

        let big = "x".repeat(512);
        let envelope = minter.unsigned("identity.create", json!({"profile": {"bio": big}}), 1, None);
        let error = node
            .publish_local(envelope.clone(), Some(&minter.keypair))
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::EventTooLarge);

        let finalized = envelope.finalize(&minter.keypair).unwrap();
        let bytes = finalized.to_wire_bytes().unwrap();
        let error = node.apply_remote(&bytes).unwrap_err();
        assert_eq!(error.code, ErrorCode::EventTooLarge);
    }
}
