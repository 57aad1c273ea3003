//! Souk node daemon.
//!
//! Minimal wiring for a single node: file-backed storage, a passphrase-
//! sealed signing key, and the sync engine over the in-process pubsub hub.
//! A production host replaces the hub with its libp2p transport behind the
//! same [`souk_sync::PeerNetwork`] port and fronts [`NodeService`] with its
//! HTTP surface; configuration comes from the environment to keep argument
//! parsing out of the core.
//!
//! ```text
//! SOUK_DATA        data directory           (default ./souk-data)
//! SOUK_PASSPHRASE  key record passphrase    (default empty)
//! SOUK_LOG_JSON    "1" for JSON log lines
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use souk_crypto::{did_from_public_key, Keypair};
use souk_node::{decrypt_key_record, seal_key_record, KeyRecord, NodeConfig, NodeService};
use souk_reducers::{Reducer, ReducerConfig};
use souk_store::FileKvStore;
use souk_sync::{InMemoryHub, InMemoryPeerNetwork, StaticKeyResolver, SyncConfig, SyncEngine};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let telemetry = souk_telemetry::TelemetryConfig {
        log_level: "info".to_string(),
        json_logs: std::env::var("SOUK_LOG_JSON").as_deref() == Ok("1"),
    };
    souk_telemetry::init(&telemetry)?;

    let data_dir =
        PathBuf::from(std::env::var("SOUK_DATA").unwrap_or_else(|_| "./souk-data".to_string()));
    let passphrase = std::env::var("SOUK_PASSPHRASE").unwrap_or_default();

    let keypair = load_or_create_key(&data_dir, &passphrase)?;
    let did = did_from_public_key(&keypair.public_key());
    info!(did = %did, "node identity loaded");

    let kv = FileKvStore::open(data_dir.join("kv.dat"))?;
    let service = Arc::new(NodeService::open(
        kv,
        Reducer::new(ReducerConfig::default()),
        NodeConfig::default(),
    )?);

    // Standalone hub until a host transport is attached behind the port
    let hub = InMemoryHub::new();
    let peer_id = did.as_str().to_string();
    let resolver = StaticKeyResolver::new();
    resolver.register(peer_id.clone(), keypair.public_key());

    let network = Arc::new(InMemoryPeerNetwork::new(hub, peer_id));
    let engine = SyncEngine::new(
        network,
        Arc::new(resolver),
        Arc::clone(&service),
        keypair,
        SyncConfig::default(),
    );
    engine.start().await?;
    info!("node running; ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    engine.stop().await;
    info!("node stopped");
    Ok(())
}

/// Load the sealed node key, creating and sealing a fresh one on first run.
fn load_or_create_key(data_dir: &PathBuf, passphrase: &str) -> Result<Keypair, Box<dyn Error>> {
    let key_path = data_dir.join("node-key.json");

    if let Ok(bytes) = std::fs::read(&key_path) {
        let record: KeyRecord = serde_json::from_slice(&bytes)?;
        return Ok(decrypt_key_record(&record, passphrase)?);
    }

    let keypair = Keypair::generate();
    let record = seal_key_record("node-key", &keypair, passphrase)?;
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&key_path, serde_json::to_vec(&record)?)?;
    info!(path = %key_path.display(), "new node key sealed");
    Ok(keypair)
}
