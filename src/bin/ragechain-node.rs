#![forbid(unsafe_code)]
//! RageChain node: loads configuration, opens the ledger and serves HTTP

use clap::Parser;
use ragechain::api::run_api_server;
use ragechain::config::{load_config, load_config_from};
use ragechain::node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// HTTP port, overrides `network.api_port`
    #[arg(short, long)]
    port: Option<u16>,
    /// Node identifier, overrides `node.id`
    #[arg(long)]
    node_id: Option<String>,
    /// Peer to register at startup (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(port) = cli.port {
        config.network.api_port = port;
    }
    if let Some(id) = cli.node_id {
        config.node.id = Some(id);
    }
    config.network.bootstrap_peers.extend(cli.peers);

    let node = Arc::new(Node::from_config(&config).await?);
    info!(
        node = %node.id(),
        backend = ?config.storage.backend,
        peers = node.peers().await.len(),
        "Starting RageChain node"
    );

    run_api_server(node, config.network.api_port).await
}
