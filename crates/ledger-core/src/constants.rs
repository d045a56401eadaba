pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const HEX_DIGIT_BITS: u32 = 4;

pub const POW_TARGET_DIFFICULTY: usize = 4;
/// A difficulty can ask for at most every hex digit of the hash to be zero.
pub const MAX_DIFFICULTY: usize = HASH_HEX_SIZE;
/// Proofs scanned per parallel round in `ProofOfWork::find_proof`.
pub const POW_SEARCH_CHUNK: u64 = 1 << 14;

pub const GENESIS_PREVIOUS_HASH: &str = "1";
pub const GENESIS_PROOF: u64 = 100;

pub const ISSUANCE_OWNER: &str = "0";
pub const ISSUANCE_ASSET_ID: &str = "0";
pub const ISSUANCE_AMOUNT: u64 = 1;

pub const PEER_FETCH_TIMEOUT_MS: u64 = 5_000;
