use crate::constants::{DEFAULT_HOST, DEFAULT_PORT, NODE_ID_BYTES};
use anyhow::{ensure, Context, Result};
use ledger_core::constants::{MAX_DIFFICULTY, PEER_FETCH_TIMEOUT_MS, POW_TARGET_DIFFICULTY};
use ledger_core::{ProofAnchor, ProofOfWork};
use rand::RngCore;
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

/// Node settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Identifier credited by issuance transactions. Random when unset.
    pub node_id: Option<String>,
    /// Leading zero hex digits required of a proof hash.
    pub difficulty: usize,
    pub proof_anchor: ProofAnchor,
    pub peer_timeout_ms: u64,
    /// Peers registered at startup.
    pub peers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            node_id: None,
            difficulty: POW_TARGET_DIFFICULTY,
            proof_anchor: ProofAnchor::default(),
            peer_timeout_ms: PEER_FETCH_TIMEOUT_MS,
            peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pow(&self) -> ProofOfWork {
        ProofOfWork::new(self.difficulty).with_anchor(self.proof_anchor)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn node_id(&self) -> String {
        self.node_id.clone().unwrap_or_else(random_node_id)
    }

    /// Rejects settings the node can't run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_DIFFICULTY).contains(&self.difficulty),
            "difficulty must be between 1 and {MAX_DIFFICULTY}, got {}",
            self.difficulty
        );
        ensure!(self.peer_timeout_ms > 0, "peer_timeout_ms must be positive");
        Ok(())
    }
}

/// Read the TOML file at `p` and deserialize into `NodeConfig`.
pub fn load<P: AsRef<Path>>(p: P) -> Result<NodeConfig> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("couldn't read config file {}", p.as_ref().display()))?;
    let cfg: NodeConfig = toml::from_str(&text)
        .with_context(|| format!("invalid config file {}", p.as_ref().display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config file {}", p.as_ref().display()))?;
    Ok(cfg)
}

/// 32 lowercase hex characters.
pub fn random_node_id() -> String {
    let mut bytes = [0u8; NODE_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.difficulty, 4);
        assert_eq!(cfg.proof_anchor, ProofAnchor::BlockDigest);
        assert_eq!(cfg.peer_timeout(), Duration::from_secs(5));
        assert!(cfg.peers.is_empty());
        assert_eq!(cfg.listen_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn parses_full_file() {
        let cfg: NodeConfig = toml::from_str(
            r#"
            host = "127.0.0.1"
            port = 5001
            node_id = "miner-1"
            difficulty = 3
            proof_anchor = "recorded-previous-hash"
            peer_timeout_ms = 250
            peers = ["http://127.0.0.1:5000"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.listen_addr(), "127.0.0.1:5001");
        assert_eq!(cfg.node_id(), "miner-1");
        assert_eq!(cfg.pow().difficulty, 3);
        assert_eq!(cfg.pow().anchor, ProofAnchor::RecordedPreviousHash);
        assert_eq!(cfg.peer_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.peers, vec!["http://127.0.0.1:5000".to_string()]);
    }

    #[test]
    fn unknown_anchor_is_rejected() {
        assert!(toml::from_str::<NodeConfig>(r#"proof_anchor = "tip""#).is_err());
    }

    #[test]
    fn difficulty_range_is_checked() {
        let mut cfg = NodeConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.difficulty = MAX_DIFFICULTY;
        assert!(cfg.validate().is_ok());

        for bad in [0, MAX_DIFFICULTY + 1, usize::MAX] {
            cfg.difficulty = bad;
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("difficulty must be between"), "{err}");
        }
    }

    #[test]
    fn zero_peer_timeout_is_rejected() {
        let cfg: NodeConfig = toml::from_str("peer_timeout_ms = 0").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn random_node_ids_differ() {
        let a = random_node_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, random_node_id());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load("/nonexistent/ledger-node.toml").unwrap_err();
        assert!(err.to_string().contains("couldn't read config file"));
    }
}
