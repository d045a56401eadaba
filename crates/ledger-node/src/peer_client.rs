//! Fetches peer chains over HTTP for conflict resolution.

use ledger_core::{ChainResponse, ChainSource, LedgerError};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct HttpChainSource {
    http: Client,
}

impl HttpChainSource {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

fn peer_unreachable(peer: &str, reason: impl ToString) -> LedgerError {
    LedgerError::PeerUnreachable {
        peer: peer.to_string(),
        reason: reason.to_string(),
    }
}

impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &str) -> ledger_core::error::Result<ChainResponse> {
        let url = format!("http://{peer}/chain");
        debug!("fetching {}", url);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| peer_unreachable(peer, e))?;
        let status = res.status();
        if !status.is_success() {
            return Err(peer_unreachable(peer, format!("status {status}")));
        }
        res.json::<ChainResponse>()
            .await
            .map_err(|e| LedgerError::InvalidChain {
                peer: peer.to_string(),
                reason: format!("malformed response: {e}"),
            })
    }
}
