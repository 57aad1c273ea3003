//! Shared test fixtures: signing actors, wired nodes, and async waiting.

use serde_json::Value;
use souk_crypto::{did_from_public_key, Keypair};
use souk_node::{NodeConfig, NodeService};
use souk_reducers::{Reducer, ReducerConfig};
use souk_store::MemoryKvStore;
use souk_sync::{
    InMemoryHub, InMemoryPeerNetwork, StaticKeyResolver, SyncConfig, SyncEngine,
};
use souk_types::{EventEnvelope, ResourceKind};
use std::sync::Arc;
use std::time::Duration;

/// A signing participant that tracks its own nonce and issuer chain.
pub struct Actor {
    pub keypair: Keypair,
    pub did: String,
    pub address: String,
    pub nonce: u64,
    pub prev: Option<String>,
}

impl Actor {
    pub fn new(seed: u8) -> Self {
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
            prev: None,
        }
    }

    /// Build and sign an event, advancing this actor's nonce and chain.
    pub fn event(
        &mut self,
        event_type: &str,
        payload: Value,
        ts: u64,
        resource_prev: Option<String>,
    ) -> EventEnvelope {
        self.nonce += 1;
        let envelope = EventEnvelope::build(
            event_type,
            self.did.clone(),
            payload,
            ts,
            self.nonce,
            self.prev.clone(),
            resource_prev,
            &self.keypair.public_key(),
        )
        .finalize(&self.keypair)
        .unwrap();
        self.prev = Some(envelope.hash.clone());
        envelope
    }
}

/// A reducer config where `minter` is the mint authority.
pub fn reducer_config(minter: &Actor) -> ReducerConfig {
    let mut config = ReducerConfig::default();
    config.mint_authorities.insert(minter.did.clone());
    config
}

/// Open an in-memory node with the given mint authority.
pub fn open_node(minter: &Actor) -> Arc<NodeService<MemoryKvStore>> {
    Arc::new(
        NodeService::open(
            MemoryKvStore::new(),
            Reducer::new(reducer_config(minter)),
            NodeConfig::default(),
        )
        .unwrap(),
    )
}

/// One node wired into a hub: service + sync engine + its peer keypair.
pub struct TestNode {
    pub service: Arc<NodeService<MemoryKvStore>>,
    pub engine: Arc<
        SyncEngine<InMemoryPeerNetwork, StaticKeyResolver, NodeService<MemoryKvStore>>,
    >,
    pub peer_id: String,
    pub peer_keypair_seed: u8,
}

/// Wire `peers` nodes onto one hub, all trusting each other's peer keys.
/// Returns the nodes and the hub (for injecting raw traffic in tests).
pub async fn wired_nodes(
    minter: &Actor,
    peers: &[&str],
) -> (Vec<TestNode>, Arc<InMemoryHub>) {
    let hub = InMemoryHub::new();

    // Every node needs every peer's key registered before traffic flows
    let seeds: Vec<(String, u8)> = peers
        .iter()
        .enumerate()
        .map(|(i, p)| (p.to_string(), 100 + i as u8))
        .collect();

    let mut nodes = Vec::new();
    for (peer_id, seed) in &seeds {
        let resolver = StaticKeyResolver::new();
        for (other_id, other_seed) in &seeds {
            resolver.register(
                other_id.clone(),
                Keypair::from_seed([*other_seed; 32]).public_key(),
            );
        }

        let service = open_node(minter);
        let network = Arc::new(InMemoryPeerNetwork::new(Arc::clone(&hub), peer_id.clone()));
        let engine = Arc::new(SyncEngine::new(
            network,
            Arc::new(resolver),
            Arc::clone(&service),
            Keypair::from_seed([*seed; 32]),
            SyncConfig::default(),
        ));
        engine.start().await.unwrap();

        nodes.push(TestNode {
            service,
            engine,
            peer_id: peer_id.clone(),
            peer_keypair_seed: *seed,
        });
    }
    (nodes, hub)
}

/// Poll until `cond` holds or the timeout elapses.
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Current head of a resource on a node, for chaining envelopes.
pub fn head(
    node: &NodeService<MemoryKvStore>,
    kind: ResourceKind,
    id: &str,
) -> Option<String> {
    node.resource_head(kind, id)
}
