use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("chain from peer {peer} rejected: {reason}")]
    InvalidChain { peer: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
