use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod consensus;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod peers;
pub mod pow;

pub use consensus::{ChainResponse, ChainSource, Resolver};
pub use error::LedgerError;
pub use ledger::Ledger;
pub use peers::PeerRegistry;
pub use pow::{ProofAnchor, ProofOfWork};

use constants::{
    GENESIS_PREVIOUS_HASH, GENESIS_PROOF, ISSUANCE_AMOUNT, ISSUANCE_ASSET_ID, ISSUANCE_OWNER,
};

pub type Hash = [u8; 32];

/// An ownership transfer of `amount` for the asset `asset_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub owner: String,
    pub receiver: String,
    pub amount: u64,
    pub asset_id: String,
}

impl Transaction {
    pub fn new(
        owner: impl Into<String>,
        receiver: impl Into<String>,
        amount: u64,
        asset_id: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            receiver: receiver.into(),
            amount,
            asset_id: asset_id.into(),
        }
    }

    /// The reward a node pays itself for forging a block.
    pub fn issuance(node_id: &str) -> Self {
        Self::new(ISSUANCE_OWNER, node_id, ISSUANCE_AMOUNT, ISSUANCE_ASSET_ID)
    }

    pub fn is_issuance(&self) -> bool {
        self.owner == ISSUANCE_OWNER && self.asset_id == ISSUANCE_ASSET_ID
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Self {
        Self {
            index,
            timestamp: now_secs(),
            transactions,
            proof,
            previous_hash,
        }
    }
}

/// The first block of every chain. It is not mined: proof and previous hash
/// are fixed sentinels.
pub fn genesis_block() -> Block {
    Block::new(1, vec![], GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string())
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Serializes a block with object keys sorted at every level and no
/// whitespace, so equal blocks produce identical bytes on every node.
pub fn canonical_json(block: &Block) -> String {
    // Strings, integers and a Vec of them: serializing into a Value can't fail.
    serde_json::to_value(block)
        .map(|value| canonical_value(&value))
        .unwrap_or_default()
}

/// Canonical rendering of an arbitrary JSON value.
pub fn canonical_value(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

// Sorts keys itself rather than relying on `Map` iteration order, which
// becomes insertion order if serde_json's `preserve_order` feature gets
// enabled anywhere in the build.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Lowercase hex SHA-256 of the block's canonical JSON.
pub fn digest(block: &Block) -> String {
    hex::encode(sha256(canonical_json(block).as_bytes()))
}

/// Same as [`digest`] for a block already in JSON form.
pub fn digest_value(value: &Value) -> String {
    hex::encode(sha256(canonical_value(value).as_bytes()))
}
