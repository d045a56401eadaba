use crate::constants::{
    GENESIS_PREVIOUS_HASH, GENESIS_PROOF, HEX_DIGIT_BITS, MAX_DIFFICULTY, POW_SEARCH_CHUNK,
    POW_TARGET_DIFFICULTY,
};
use crate::{digest, sha256, Block, Hash};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which hash of the previous block a proof is bound to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProofAnchor {
    /// `digest(prev)`: the previous block's actual content.
    #[default]
    BlockDigest,
    /// `prev.previous_hash`: the hash recorded inside the previous block.
    /// Kept for interoperability with nodes that validate this way.
    RecordedPreviousHash,
}

impl ProofAnchor {
    pub fn last_hash(self, last_block: &Block) -> String {
        match self {
            ProofAnchor::BlockDigest => digest(last_block),
            ProofAnchor::RecordedPreviousHash => last_block.previous_hash.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Number of leading zero hex digits a proof hash must have.
    pub difficulty: usize,
    pub anchor: ProofAnchor,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(POW_TARGET_DIFFICULTY)
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            anchor: ProofAnchor::default(),
        }
    }

    pub fn with_anchor(mut self, anchor: ProofAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Smallest non-negative proof valid on top of `last_block`.
    ///
    /// Proofs are scanned in chunks; inside a chunk rayon searches in parallel
    /// but `find_first` keeps the lowest hit, so the answer is the same as a
    /// sequential scan from zero. Never returns if `difficulty` exceeds
    /// [`MAX_DIFFICULTY`].
    pub fn find_proof(&self, last_block: &Block) -> u64 {
        let last_proof = last_block.proof;
        let last_hash = self.anchor.last_hash(last_block);

        let mut start = 0u64;
        loop {
            let end = start.saturating_add(POW_SEARCH_CHUNK);
            let found = (start..end)
                .into_par_iter()
                .find_first(|proof| self.verify_proof(last_proof, *proof, &last_hash));
            if let Some(proof) = found {
                info!(
                    "found proof {} on top of block {} (difficulty {})",
                    proof, last_block.index, self.difficulty
                );
                return proof;
            }
            start = end;
        }
    }

    /// Cheap check of a claimed proof: `sha256("{last_proof}{proof}{last_hash}")`
    /// must start with `difficulty` zero hex digits.
    pub fn verify_proof(&self, last_proof: u64, proof: u64, last_hash: &str) -> bool {
        valid_proof(last_proof, proof, last_hash, self.difficulty)
    }

    /// Walks `chain` pairwise from genesis checking indices, linkage and
    /// proofs. The first block must carry the genesis sentinels.
    pub fn is_valid_chain(&self, chain: &[Block]) -> bool {
        let Some(genesis) = chain.first() else {
            return false;
        };
        if !is_genesis(genesis) {
            debug!("chain does not start with a genesis block");
            return false;
        }
        for pair in chain.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if prev.index.checked_add(1) != Some(curr.index) {
                debug!("block {} does not follow block {}", curr.index, prev.index);
                return false;
            }
            if curr.previous_hash != digest(prev) {
                debug!("block {} does not link to its predecessor", curr.index);
                return false;
            }
            if !self.verify_proof(prev.proof, curr.proof, &self.anchor.last_hash(prev)) {
                debug!("block {} carries an invalid proof", curr.index);
                return false;
            }
        }
        true
    }
}

fn is_genesis(block: &Block) -> bool {
    block.index == 1 && block.proof == GENESIS_PROOF && block.previous_hash == GENESIS_PREVIOUS_HASH
}

/// Zero bits a proof hash needs at `difficulty`. Anything past
/// [`MAX_DIFFICULTY`] asks for more bits than a hash has and never matches.
fn required_zero_bits(difficulty: usize) -> Option<u32> {
    if difficulty > MAX_DIFFICULTY {
        return None;
    }
    u32::try_from(difficulty).ok()?.checked_mul(HEX_DIGIT_BITS)
}

pub fn valid_proof(last_proof: u64, proof: u64, last_hash: &str, difficulty: usize) -> bool {
    let Some(required) = required_zero_bits(difficulty) else {
        return false;
    };
    let guess = format!("{last_proof}{proof}{last_hash}");
    let hash = sha256(guess.as_bytes());
    count_leading_zero_bits(&hash) >= required
}

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}
