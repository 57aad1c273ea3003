//! # Sync Engine
//!
//! Subscribes to the three gossip topics and runs the ingress pipeline on
//! every message:
//!
//! 1. Size gate (`max_envelope_bytes`) - oversize is silently dropped.
//! 2. Decode gate - undecodable or mislabeled envelopes are dropped.
//! 3. Self-drop - own messages are ignored.
//! 4. Signature gate - the sender's resolved key must verify the envelope.
//! 5. Topic dispatch - events apply through the [`LedgerGateway`];
//!    requests are served within the configured bounds; responses are
//!    ingested event-by-event, snapshots only after hash verification.
//!
//! Invalid traffic is never answered; it only debits the peer's local
//! score. A reducer rejection debits the peer and the batch continues -
//! rejection never stalls the log.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use souk_crypto::{sha256_hex, Keypair};
use souk_types::{
    content_type, RangeRequest, RangeResponse, SnapshotRequest, SnapshotResponse,
};

use crate::envelope::PeerEnvelope;
use crate::errors::SyncError;
use crate::peers::PeerScoreTable;
use crate::ports::{LedgerGateway, PeerKeyResolver, PeerNetwork};
use crate::topics::{TOPIC_EVENTS, TOPIC_REQUESTS, TOPIC_RESPONSES};

/// Engine bounds and switches.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hard bound on a raw peer envelope.
    pub max_envelope_bytes: usize,
    /// Hard bound on a single inner event envelope.
    pub max_event_bytes: usize,
    /// Clamp on the `limit` of served range requests.
    pub max_range_limit: u32,
    /// Byte budget of a served range batch.
    pub max_range_bytes: usize,
    /// Largest snapshot the engine will send or accept.
    pub max_snapshot_bytes: usize,
    /// Verify peer envelope signatures on ingress.
    pub verify_peer_signatures: bool,
    /// Bound on outstanding range serves per peer.
    pub max_in_flight_requests: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_envelope_bytes: 1024 * 1024,
            max_event_bytes: souk_types::MAX_EVENT_SIZE,
            max_range_limit: 256,
            max_range_bytes: 512 * 1024,
            max_snapshot_bytes: 16 * 1024 * 1024,
            verify_peer_signatures: true,
            max_in_flight_requests: PeerScoreTable::DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// The gossip and anti-entropy engine.
///
/// Generic over its three ports; production wires libp2p and the node
/// service, tests wire the in-memory adapters.
pub struct SyncEngine<N, R, G>
where
    N: PeerNetwork + 'static,
    R: PeerKeyResolver + 'static,
    G: LedgerGateway + 'static,
{
    inner: Arc<EngineInner<N, R, G>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

struct EngineInner<N, R, G> {
    network: Arc<N>,
    resolver: Arc<R>,
    gateway: Arc<G>,
    keypair: Keypair,
    config: SyncConfig,
    scores: PeerScoreTable,
}

impl<N, R, G> SyncEngine<N, R, G>
where
    N: PeerNetwork + 'static,
    R: PeerKeyResolver + 'static,
    G: LedgerGateway + 'static,
{
    /// Build an engine. `keypair` signs this node's peer envelopes.
    pub fn new(
        network: Arc<N>,
        resolver: Arc<R>,
        gateway: Arc<G>,
        keypair: Keypair,
        config: SyncConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let scores = PeerScoreTable::with_max_in_flight(config.max_in_flight_requests);
        Self {
            inner: Arc::new(EngineInner {
                network,
                resolver,
                gateway,
                keypair,
                config,
                scores,
            }),
            stop_tx,
            stop_rx,
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Peer score table, for the host's peer management.
    #[must_use]
    pub fn scores(&self) -> &PeerScoreTable {
        &self.inner.scores
    }

    /// Subscribe all topics and start the ingress tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if any subscription fails.
    pub async fn start(&self) -> Result<(), SyncError> {
        let mut tasks = Vec::new();
        for topic in [TOPIC_EVENTS, TOPIC_REQUESTS, TOPIC_RESPONSES] {
            let mut subscription = self.inner.network.subscribe(topic).await?;
            let inner = Arc::clone(&self.inner);
            let mut stop_rx = self.stop_rx.clone();
            let topic = topic.to_string();

            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        message = subscription.recv() => {
                            match message {
                                Some(bytes) => inner.handle_raw(&topic, bytes).await,
                                None => break,
                            }
                        }
                    }
                }
                subscription.close();
            }));
        }

        self.tasks.lock().extend(tasks);
        info!(peer = %self.inner.network.local_peer_id(), "sync engine started");
        Ok(())
    }

    /// Unsubscribe all topics and wait for in-flight handlers to finish.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
        info!("sync engine stopped");
    }

    /// Broadcast a locally-produced event's wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if publishing fails.
    pub async fn broadcast_event(&self, event_bytes: Vec<u8>) -> Result<(), SyncError> {
        self.inner
            .publish(TOPIC_EVENTS, content_type::EVENT, event_bytes)
            .await
    }

    /// Ask peers for a log slice.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if publishing fails.
    pub async fn request_range(
        &self,
        from: Option<String>,
        limit: u32,
    ) -> Result<(), SyncError> {
        let request = RangeRequest { from, limit };
        let payload = bincode::serialize(&request).map_err(|e| SyncError::Transport {
            message: e.to_string(),
        })?;
        self.inner
            .publish(TOPIC_REQUESTS, content_type::RANGE_REQUEST, payload)
            .await
    }

    /// Ask peers for their latest snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if publishing fails.
    pub async fn request_snapshot(&self, from: Option<String>) -> Result<(), SyncError> {
        let request = SnapshotRequest { from };
        let payload = bincode::serialize(&request).map_err(|e| SyncError::Transport {
            message: e.to_string(),
        })?;
        self.inner
            .publish(TOPIC_REQUESTS, content_type::SNAPSHOT_REQUEST, payload)
            .await
    }
}

impl<N, R, G> EngineInner<N, R, G>
where
    N: PeerNetwork + 'static,
    R: PeerKeyResolver + 'static,
    G: LedgerGateway + 'static,
{
    /// Seal and publish a message on a topic.
    async fn publish(
        &self,
        topic: &str,
        content: &str,
        payload: Vec<u8>,
    ) -> Result<(), SyncError> {
        let envelope = PeerEnvelope::seal(
            topic,
            self.network.local_peer_id(),
            now_millis(),
            content,
            payload,
            &self.keypair,
        )?;
        self.network.publish(topic, envelope.encode()?).await
    }

    /// The ingress pipeline for one raw message.
    async fn handle_raw(&self, topic: &str, bytes: Vec<u8>) {
        // 1. Size gate - oversize cannot even be attributed, drop silently
        if bytes.len() > self.config.max_envelope_bytes {
            debug!(topic, size = bytes.len(), "oversize peer envelope dropped");
            return;
        }

        // 2. Decode gate
        let envelope = match PeerEnvelope::decode(&bytes) {
            Ok(envelope) => envelope,
            Err(_) => {
                debug!(topic, "undecodable peer envelope dropped");
                return;
            }
        };
        if envelope.topic != topic {
            self.scores.debit_invalid_message(&envelope.sender);
            debug!(
                topic,
                claimed = %envelope.topic,
                sender = %envelope.sender,
                "mislabeled peer envelope dropped"
            );
            return;
        }

        // 3. Self-drop
        if envelope.sender == self.network.local_peer_id() {
            return;
        }

        // 4. Signature gate
        if self.config.verify_peer_signatures {
            let verified = self
                .resolver
                .resolve_peer_public_key(&envelope.sender)
                .map(|key| envelope.verify(&key).is_ok())
                .unwrap_or(false);
            if !verified {
                self.scores.debit_invalid_signature(&envelope.sender);
                debug!(sender = %envelope.sender, "peer signature failed, dropped");
                return;
            }
        }

        // 5. Topic dispatch
        match topic {
            TOPIC_EVENTS => self.handle_event(&envelope).await,
            TOPIC_REQUESTS => self.handle_request(&envelope).await,
            TOPIC_RESPONSES => self.handle_response(&envelope).await,
            _ => {}
        }
    }

    async fn handle_event(&self, envelope: &PeerEnvelope) {
        if envelope.content_type != content_type::EVENT {
            self.scores.debit_invalid_message(&envelope.sender);
            return;
        }
        self.ingest_event(&envelope.sender, &envelope.payload).await;
    }

    /// Apply one inner event; scoring happens here for both the events
    /// topic and range responses.
    async fn ingest_event(&self, sender: &str, event_bytes: &[u8]) {
        if event_bytes.len() > self.config.max_event_bytes {
            self.scores.debit_invalid_message(sender);
            debug!(sender, size = event_bytes.len(), "oversize event dropped");
            return;
        }

        match self.gateway.apply_event_bytes(event_bytes).await {
            Ok(()) => self.scores.credit_event_applied(sender),
            Err(error) => {
                // A rejected event is discarded; later events on the same
                // chain will conflict and be discarded too, until the log
                // catches up through anti-entropy.
                self.scores.debit_event_rejected(sender);
                debug!(sender, code = %error.code, "ingested event rejected");
            }
        }
    }

    async fn handle_request(&self, envelope: &PeerEnvelope) {
        if !self.scores.try_begin_request(&envelope.sender) {
            debug!(sender = %envelope.sender, "request dropped: peer at in-flight bound");
            return;
        }

        match envelope.content_type.as_str() {
            content_type::RANGE_REQUEST => self.serve_range(envelope).await,
            content_type::SNAPSHOT_REQUEST => self.serve_snapshot(envelope).await,
            _ => {
                self.scores.debit_invalid_message(&envelope.sender);
            }
        }

        self.scores.end_request(&envelope.sender);
    }

    async fn serve_range(&self, envelope: &PeerEnvelope) {
        let request: RangeRequest = match bincode::deserialize(&envelope.payload) {
            Ok(request) => request,
            Err(_) => {
                self.scores.debit_invalid_message(&envelope.sender);
                return;
            }
        };

        let limit = request.limit.min(self.config.max_range_limit);
        let response = match self
            .gateway
            .serve_range(request.from, limit, self.config.max_range_bytes)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(code = %error.code, "range serve failed");
                return;
            }
        };

        let Ok(payload) = bincode::serialize(&response) else {
            return;
        };
        if let Err(error) = self
            .publish(TOPIC_RESPONSES, content_type::RANGE_RESPONSE, payload)
            .await
        {
            warn!(error = %error, "range response publish failed");
        }
    }

    async fn serve_snapshot(&self, envelope: &PeerEnvelope) {
        if bincode::deserialize::<SnapshotRequest>(&envelope.payload).is_err() {
            self.scores.debit_invalid_message(&envelope.sender);
            return;
        }

        let snapshot = match self.gateway.latest_snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(error) => {
                warn!(code = %error.code, "snapshot serve failed");
                return;
            }
        };
        if snapshot.snapshot.len() > self.config.max_snapshot_bytes {
            debug!(size = snapshot.snapshot.len(), "snapshot exceeds bound, not served");
            return;
        }

        let Ok(payload) = bincode::serialize(&snapshot) else {
            return;
        };
        if let Err(error) = self
            .publish(TOPIC_RESPONSES, content_type::SNAPSHOT_RESPONSE, payload)
            .await
        {
            warn!(error = %error, "snapshot response publish failed");
        }
    }

    async fn handle_response(&self, envelope: &PeerEnvelope) {
        match envelope.content_type.as_str() {
            content_type::RANGE_RESPONSE => {
                let response: RangeResponse = match bincode::deserialize(&envelope.payload) {
                    Ok(response) => response,
                    Err(_) => {
                        self.scores.debit_invalid_message(&envelope.sender);
                        return;
                    }
                };
                for event_bytes in &response.events {
                    self.ingest_event(&envelope.sender, event_bytes).await;
                }
            }
            content_type::SNAPSHOT_RESPONSE => {
                let response: SnapshotResponse = match bincode::deserialize(&envelope.payload) {
                    Ok(response) => response,
                    Err(_) => {
                        self.scores.debit_invalid_message(&envelope.sender);
                        return;
                    }
                };
                if response.snapshot.len() > self.config.max_snapshot_bytes {
                    self.scores.debit_invalid_message(&envelope.sender);
                    return;
                }
                if sha256_hex(&response.snapshot) != response.hash {
                    self.scores.debit_invalid_message(&envelope.sender);
                    debug!(sender = %envelope.sender, "snapshot hash mismatch, dropped");
                    return;
                }
                if let Err(error) = self
                    .gateway
                    .restore_snapshot(&response.hash, &response.snapshot)
                    .await
                {
                    warn!(code = %error.code, "snapshot restore failed");
                }
            }
            _ => {
                self.scores.debit_invalid_message(&envelope.sender);
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
