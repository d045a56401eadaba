//! Longest-valid-chain conflict resolution across registered peers.

use crate::constants::PEER_FETCH_TIMEOUT_MS;
use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::pow::ProofOfWork;
use crate::Block;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Body of a node's "fetch chain" response; also what peers are expected to
/// send back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

/// Transport used to pull a peer's full chain.
pub trait ChainSource: Send + Sync + 'static {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<ChainResponse>> + Send;
}

pub struct Resolver<S: ChainSource> {
    source: Arc<S>,
    timeout: Duration,
}

impl<S: ChainSource> Resolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            timeout: Duration::from_millis(PEER_FETCH_TIMEOUT_MS),
        }
    }

    /// Upper bound on each peer fetch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetches every peer's chain concurrently and adopts the longest valid
    /// one that beats the local length. Returns whether the chain was
    /// replaced. Unreachable peers and invalid chains are skipped.
    pub async fn resolve_conflicts(&self, ledger: &Ledger) -> bool {
        let peers = ledger.peers();
        let local_len = ledger.len();
        debug!("resolving against {} peer(s), local length {}", peers.len(), local_len);

        let fetched = self.fetch_all(peers).await;
        match select_longest_valid(ledger.pow(), local_len, fetched) {
            Some((peer, chain)) => {
                let replaced = ledger.replace_chain_if_longer(chain);
                if replaced {
                    info!("adopted chain from {}", peer);
                }
                replaced
            }
            None => false,
        }
    }

    async fn fetch_all(&self, peers: Vec<String>) -> Vec<(String, Result<ChainResponse>)> {
        let mut tasks = JoinSet::new();
        for peer in peers {
            let source = self.source.clone();
            let timeout = self.timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(timeout, source.fetch_chain(&peer)).await {
                    Ok(result) => result,
                    Err(_) => Err(LedgerError::PeerUnreachable {
                        peer: peer.clone(),
                        reason: format!("no response within {timeout:?}"),
                    }),
                };
                (peer, result)
            });
        }

        let mut fetched = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => fetched.push(pair),
                Err(e) => warn!("peer fetch task failed: {}", e),
            }
        }
        fetched.sort_by(|a, b| a.0.cmp(&b.0));
        fetched
    }
}

/// Picks the longest chain that is strictly longer than `local_len` and
/// passes validation. Ties go to the first candidate, so callers should pass
/// results in a stable order.
pub fn select_longest_valid<I>(
    pow: &ProofOfWork,
    local_len: usize,
    results: I,
) -> Option<(String, Vec<Block>)>
where
    I: IntoIterator<Item = (String, Result<ChainResponse>)>,
{
    let mut max_len = local_len;
    let mut best = None;

    for (peer, result) in results {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("skipping peer: {}", e);
                continue;
            }
        };
        match check_candidate(pow, &peer, &response, max_len) {
            Ok(true) => {
                max_len = response.length;
                best = Some((peer, response.chain));
            }
            Ok(false) => {}
            Err(e) => warn!("{}", e),
        }
    }
    best
}

fn check_candidate(
    pow: &ProofOfWork,
    peer: &str,
    response: &ChainResponse,
    max_len: usize,
) -> Result<bool> {
    if response.length != response.chain.len() {
        return Err(LedgerError::InvalidChain {
            peer: peer.to_string(),
            reason: format!(
                "reported length {} but sent {} block(s)",
                response.length,
                response.chain.len()
            ),
        });
    }
    if response.length <= max_len {
        return Ok(false);
    }
    if !pow.is_valid_chain(&response.chain) {
        return Err(LedgerError::InvalidChain {
            peer: peer.to_string(),
            reason: "linkage or proof check failed".to_string(),
        });
    }
    Ok(true)
}
