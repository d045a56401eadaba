//! The ledger engine: sole owner and mutator of the chain, the transaction
//! pool and the peer registry.

use crate::consensus::ChainResponse;
use crate::error::Result;
use crate::peers::PeerRegistry;
use crate::pow::ProofOfWork;
use crate::{digest, genesis_block, Block, Transaction};
use parking_lot::RwLock;
use tracing::{debug, info};

/// Chain and pool change together, so they live under one lock.
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pool: Vec<Transaction>,
}

impl LedgerState {
    fn last_block(&self) -> &Block {
        // The chain always holds at least the genesis block.
        &self.chain[self.chain.len() - 1]
    }

    fn forge(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash = previous_hash.unwrap_or_else(|| digest(self.last_block()));
        let transactions = std::mem::take(&mut self.pool);
        let block = Block::new(self.chain.len() as u64 + 1, transactions, proof, previous_hash);
        self.chain.push(block.clone());
        block
    }
}

#[derive(Debug)]
pub struct Ledger {
    node_id: String,
    pow: ProofOfWork,
    state: RwLock<LedgerState>,
    peers: RwLock<PeerRegistry>,
}

impl Ledger {
    /// A fresh ledger holding only the genesis block.
    pub fn new(node_id: impl Into<String>, pow: ProofOfWork) -> Self {
        Self {
            node_id: node_id.into(),
            pow,
            state: RwLock::new(LedgerState {
                chain: vec![genesis_block()],
                pool: Vec::new(),
            }),
            peers: RwLock::new(PeerRegistry::new()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn chain(&self) -> Vec<Block> {
        self.state.read().chain.clone()
    }

    /// Chain and its length taken from the same read.
    pub fn chain_response(&self) -> ChainResponse {
        let state = self.state.read();
        ChainResponse {
            chain: state.chain.clone(),
            length: state.chain.len(),
        }
    }

    /// Number of blocks; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.state.read().chain.len()
    }

    pub fn last_block(&self) -> Block {
        self.state.read().last_block().clone()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.read().pool.clone()
    }

    /// Queues a transaction and returns the index of the block it is
    /// expected to land in. The index is advisory: a concurrent mine or a
    /// chain replacement may move it.
    pub fn submit_transaction(&self, tx: Transaction) -> u64 {
        let mut state = self.state.write();
        state.pool.push(tx);
        state.chain.len() as u64 + 1
    }

    /// Appends a block holding the whole pool, which is emptied in the same
    /// critical section. `previous_hash` defaults to the digest of the tip.
    pub fn create_block(&self, proof: u64, previous_hash: Option<String>) -> Block {
        let block = self.state.write().forge(proof, previous_hash);
        info!(
            "forged block {} with {} transaction(s)",
            block.index,
            block.transactions.len()
        );
        block
    }

    /// Runs proof-of-work on the current tip, rewards this node and forges
    /// the block. Blocks the calling thread for the whole search.
    ///
    /// The search runs without holding any lock. If the tip moved while it
    /// ran (another block was forged or the chain was replaced) the search
    /// starts over on the new tip.
    pub fn mine(&self) -> Block {
        loop {
            let last = self.last_block();
            let proof = self.pow.find_proof(&last);
            match self.commit_mined(&digest(&last), proof) {
                Some(block) => return block,
                None => debug!("tip moved during proof search, retrying"),
            }
        }
    }

    /// Forges a block with `proof`, the pool as it is now and this node's
    /// issuance, provided the tip still hashes to `last_hash`.
    fn commit_mined(&self, last_hash: &str, proof: u64) -> Option<Block> {
        let mut state = self.state.write();
        if digest(state.last_block()) != last_hash {
            return None;
        }
        state.pool.push(Transaction::issuance(&self.node_id));
        let block = state.forge(proof, Some(last_hash.to_string()));
        drop(state);

        info!(
            "mined block {} with proof {} and {} transaction(s)",
            block.index,
            block.proof,
            block.transactions.len()
        );
        Some(block)
    }

    pub fn register_peer(&self, address: &str) -> Result<bool> {
        self.peers.write().register(address)
    }

    /// Registers all addresses (or none, on the first invalid one) and
    /// returns the full peer list.
    pub fn register_peers<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<String>> {
        let mut peers = self.peers.write();
        let added = peers.register_all(addresses)?;
        debug!("registered {} new peer(s), {} known", added, peers.len());
        Ok(peers.list())
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.read().list()
    }

    /// Swaps in `candidate` if it is still longer than the local chain. The
    /// caller is expected to have validated it. The pool is left alone.
    pub fn replace_chain_if_longer(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.state.write();
        if candidate.len() <= state.chain.len() {
            debug!(
                "candidate of length {} no longer beats local length {}",
                candidate.len(),
                state.chain.len()
            );
            return false;
        }
        info!(
            "replacing chain of length {} with length {}",
            state.chain.len(),
            candidate.len()
        );
        state.chain = candidate;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use std::sync::Arc;
    use std::thread;

    fn test_ledger() -> Ledger {
        Ledger::new("node-a", ProofOfWork::new(2))
    }

    fn assert_valid(ledger: &Ledger) {
        assert!(ledger.pow().is_valid_chain(&ledger.chain()));
    }

    fn tx(n: u64) -> Transaction {
        Transaction::new(format!("owner-{n}"), format!("receiver-{n}"), n, format!("asset-{n}"))
    }

    #[test]
    fn new_ledger_holds_genesis() {
        let ledger = test_ledger();
        assert_eq!(ledger.len(), 1);
        let genesis = ledger.last_block();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, 100);
        assert_eq!(genesis.previous_hash, "1");
        assert!(genesis.transactions.is_empty());
        assert!(ledger.pending_transactions().is_empty());
        assert!(ledger.peers().is_empty());
        assert_valid(&ledger);
    }

    #[test]
    fn submit_returns_next_index() {
        let ledger = test_ledger();
        assert_eq!(ledger.submit_transaction(tx(1)), 2);
        assert_eq!(ledger.submit_transaction(tx(2)), 2);
        assert_eq!(ledger.pending_transactions(), vec![tx(1), tx(2)]);
        ledger.mine();
        assert_eq!(ledger.submit_transaction(tx(3)), 3);
    }

    #[test]
    fn create_block_drains_pool() {
        let ledger = test_ledger();
        ledger.submit_transaction(tx(1));
        let genesis_hash = digest(&ledger.last_block());

        let block = ledger.create_block(42, None);
        assert_eq!(block.index, 2);
        assert_eq!(block.proof, 42);
        assert_eq!(block.previous_hash, genesis_hash);
        assert_eq!(block.transactions, vec![tx(1)]);
        assert!(ledger.pending_transactions().is_empty());
        assert_eq!(ledger.last_block(), block);

        let explicit = ledger.create_block(7, Some("abc".into()));
        assert_eq!(explicit.index, 3);
        assert_eq!(explicit.previous_hash, "abc");
        assert!(explicit.transactions.is_empty());
    }

    #[test]
    fn mine_includes_pool_and_one_issuance() {
        let ledger = test_ledger();
        for n in 0..3 {
            ledger.submit_transaction(tx(n));
        }
        let block = ledger.mine();
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions.len(), 4);
        assert_eq!(&block.transactions[..3], &[tx(0), tx(1), tx(2)]);
        assert_eq!(block.transactions[3], Transaction::issuance("node-a"));
        assert_eq!(block.transactions.iter().filter(|t| t.is_issuance()).count(), 1);
        assert!(ledger.pending_transactions().is_empty());
        assert_valid(&ledger);
    }

    #[test]
    fn mining_twice_does_not_reemit_transactions() {
        let ledger = test_ledger();
        ledger.submit_transaction(tx(9));
        ledger.mine();
        let second = ledger.mine();
        assert_eq!(second.index, 3);
        assert_eq!(second.transactions, vec![Transaction::issuance("node-a")]);
        assert_eq!(ledger.len(), 3);
        assert_valid(&ledger);
    }

    #[test]
    fn tx_submitted_during_search_lands_in_mined_block() {
        let ledger = test_ledger();
        ledger.submit_transaction(tx(1));
        let last = ledger.last_block();
        let proof = ledger.pow().find_proof(&last);

        // Arrives after the snapshot, before the commit.
        assert_eq!(ledger.submit_transaction(tx(2)), 2);

        let block = ledger.commit_mined(&digest(&last), proof).unwrap();
        assert_eq!(block.index, 2);
        assert_eq!(
            block.transactions,
            vec![tx(1), tx(2), Transaction::issuance("node-a")]
        );
        assert!(ledger.pending_transactions().is_empty());
        assert_valid(&ledger);
    }

    #[test]
    fn mine_restarts_when_tip_moves_during_search() {
        let donor = test_ledger();
        donor.mine();
        donor.mine();

        let ledger = test_ledger();
        ledger.submit_transaction(tx(1));
        let stale = ledger.last_block();
        let proof = ledger.pow().find_proof(&stale);

        // The chain is replaced while the search on the old tip runs.
        assert!(ledger.replace_chain_if_longer(donor.chain()));
        assert_eq!(ledger.commit_mined(&digest(&stale), proof), None);
        assert_eq!(ledger.chain(), donor.chain());
        assert_eq!(ledger.pending_transactions(), vec![tx(1)]);

        let block = ledger.mine();
        let new_tip = donor.last_block();
        assert_eq!(block.index, new_tip.index + 1);
        assert_eq!(block.previous_hash, digest(&new_tip));
        assert_eq!(block.transactions, vec![tx(1), Transaction::issuance("node-a")]);
        assert_eq!(ledger.len(), 4);
        assert_valid(&ledger);
    }

    #[test]
    fn concurrent_mining_keeps_chain_valid() {
        let ledger = Arc::new(test_ledger());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                thread::spawn(move || ledger.mine())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.len(), 5);
        assert_valid(&ledger);
        let chain = ledger.chain();
        for (i, block) in chain.iter().enumerate() {
            assert_eq!(block.index, i as u64 + 1);
        }
    }

    #[test]
    fn readers_never_see_half_forged_block() {
        let ledger = Arc::new(test_ledger());
        let writer = {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for n in 0..20 {
                    ledger.submit_transaction(tx(n));
                    ledger.create_block(n, None);
                }
            })
        };
        for _ in 0..500 {
            let state = ledger.state.read();
            let tip = state.last_block();
            // Every forged block took the whole pool with it.
            for pending in &state.pool {
                assert!(!tip.transactions.contains(pending));
            }
        }
        writer.join().unwrap();
        assert!(ledger.pending_transactions().is_empty());
        assert_eq!(ledger.len(), 21);
    }

    #[test]
    fn peer_registration() {
        let ledger = test_ledger();
        assert!(ledger.register_peer("http://host:5000").unwrap());
        assert!(!ledger.register_peer("host:5000").unwrap());
        assert_eq!(ledger.peers(), vec!["host:5000".to_string()]);

        let err = ledger.register_peers(&["other:5000", ""][..]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress(_)));
        assert_eq!(ledger.peers().len(), 1);

        let peers = ledger.register_peers(&["other:5000"][..]).unwrap();
        assert_eq!(peers, vec!["host:5000".to_string(), "other:5000".to_string()]);
    }

    #[test]
    fn replace_chain_requires_longer_candidate() {
        let donor = test_ledger();
        donor.mine();
        donor.mine();

        let ledger = test_ledger();
        ledger.submit_transaction(tx(1));
        assert!(!ledger.replace_chain_if_longer(vec![genesis_block()]));
        assert!(ledger.replace_chain_if_longer(donor.chain()));
        assert_eq!(ledger.chain(), donor.chain());
        assert_eq!(ledger.pending_transactions(), vec![tx(1)]);
        assert!(!ledger.replace_chain_if_longer(donor.chain()));
    }

    #[test]
    fn chain_response_length_matches() {
        let ledger = test_ledger();
        ledger.mine();
        let response = ledger.chain_response();
        assert_eq!(response.length, 2);
        assert_eq!(response.chain.len(), 2);
    }
}
