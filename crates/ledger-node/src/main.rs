use anyhow::Context;
use clap::Parser;
use ledger_core::{Ledger, ProofAnchor};
use ledger_node::{app, config, peer_client::HttpChainSource, AppState};
use std::{net::SocketAddr, path::PathBuf};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "Proof-of-work ledger node")]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interface to bind, e.g. 127.0.0.1
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Identifier credited by mining rewards
    #[arg(long)]
    node_id: Option<String>,

    /// Leading zero hex digits required of a proof hash
    #[arg(long)]
    difficulty: Option<usize>,

    /// Per-peer fetch timeout during conflict resolution
    #[arg(long)]
    peer_timeout_ms: Option<u64>,

    /// Anchor proofs on the previous block's recorded previous_hash
    #[arg(long)]
    legacy_proof_anchor: bool,

    /// Peer to register at startup (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<config::NodeConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load(path)?,
            None => config::NodeConfig::default(),
        };
        if let Some(host) = self.host {
            cfg.host = host;
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if self.node_id.is_some() {
            cfg.node_id = self.node_id;
        }
        if let Some(difficulty) = self.difficulty {
            cfg.difficulty = difficulty;
        }
        if let Some(ms) = self.peer_timeout_ms {
            cfg.peer_timeout_ms = ms;
        }
        if self.legacy_proof_anchor {
            cfg.proof_anchor = ProofAnchor::RecordedPreviousHash;
        }
        cfg.peers.extend(self.peers);
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = Args::parse().into_config()?;
    let node_id = cfg.node_id();
    let ledger = Ledger::new(node_id.clone(), cfg.pow());
    if !cfg.peers.is_empty() {
        ledger
            .register_peers(cfg.peers.as_slice())
            .context("invalid bootstrap peer")?;
    }

    let source = HttpChainSource::new(cfg.peer_timeout())?;
    let state = AppState::new(ledger, source, cfg.peer_timeout());

    let addr: SocketAddr = cfg.listen_addr().parse()?;
    info!(
        "ledger-node {} listening on http://{addr} (difficulty {}, {:?})",
        node_id, cfg.difficulty, cfg.proof_anchor
    );
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app(state)).await?;
    Ok(())
}
