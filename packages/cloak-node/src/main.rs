//! Cloak Node
//!
//! A privacy relay node. It runs two HTTP listeners over one shared node:
//!
//! 1. **Peer API** (`node_port`, CBOR): other nodes push sealed payloads and
//!    privacy group definitions here and exchange party info.
//!
//! 2. **Client API** (`client_port`, JSON): local applications send and
//!    receive payloads and manage privacy groups.
//!
//! **Privacy**: plaintext only crosses the client listener. Peers receive
//! sealed bundles that only the listed recipients can open.

mod config;
mod http;
mod keygen;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use cloak_core::keystore::{FileKeyStore, KeyStore};
use cloak_core::network::{HttpPeerClient, NetworkDiscovery, NetworkNodes, PeerClient};
use cloak_core::storage::StorageBackend;
use cloak_core::{Enclave, Node};

use config::{ConfigError, NodeConfig};

const DEFAULT_LOG_FILTER: &str = "cloak_node=info,cloak_core=info,tower_http=info";

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cloak-node", version, about = "Cloak privacy relay node")]
struct Args {
    /// TOML config file. Defaults apply when omitted.
    #[arg(env = "CLOAK_CONFIG")]
    config: Option<PathBuf>,

    /// Write `<name>.pub` / `<name>.key` for each name (comma-separated)
    /// under the configured work_dir, then exit.
    #[arg(short = 'g', long, value_delimiter = ',', num_args = 1..)]
    generate_keys: Vec<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "CLOAK_LOG_JSON")]
    log_json: bool,
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] cloak_core::Error),

    #[error("Listener failed: {0}")]
    Io(#[from] std::io::Error),
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_json);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Node stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: Args) -> Result<(), StartupError> {
    let config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };

    if !args.generate_keys.is_empty() {
        for key in keygen::generate_keys(&config.work_dir, &args.generate_keys)? {
            println!("{}", key);
        }
        return Ok(());
    }

    // ── Node Setup ────────────────────────────────────────────────────────

    let keystore = FileKeyStore::load(&config.key_pairs())?;
    if keystore.node_keys().is_empty() {
        tracing::warn!("No node keys configured; requests without an explicit identity will fail");
    }

    let storage_config = config.storage_config()?;
    let storage = StorageBackend::open(&storage_config)?;
    tracing::info!(storage = %storage_config, "Opened storage");

    let network = NetworkNodes::new(&config.node_url())?;
    for url in &config.other_nodes {
        network.add_url(url)?;
        tracing::info!(peer = url.as_str(), "Configured seed node");
    }

    let peers: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new(config.peer_timeout())?);
    let node = Node::new(
        Enclave::new(Arc::new(keystore)),
        &storage,
        network.clone(),
        Arc::clone(&peers),
    )?;

    // ── Discovery ─────────────────────────────────────────────────────────

    let discovery = NetworkDiscovery::new(network, peers, config.discovery_interval()).start();

    // ── Listeners ─────────────────────────────────────────────────────────

    let node_listener = TcpListener::bind(config.node_bind_addr()).await?;
    let client_listener = TcpListener::bind(config.client_bind_addr()).await?;

    tracing::info!(
        node_url = config.node_url().as_str(),
        client_url = config.client_url().as_str(),
        keys = node.enclave().node_keys().len(),
        "Cloak node starting"
    );

    let node_server = axum::serve(node_listener, http::node_router(node.clone()))
        .with_graceful_shutdown(shutdown_signal());
    let client_server = axum::serve(client_listener, http::client_router(node))
        .with_graceful_shutdown(shutdown_signal());

    let result = tokio::try_join!(async { node_server.await }, async { client_server.await });
    discovery.abort();
    result?;

    tracing::info!("Cloak node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
