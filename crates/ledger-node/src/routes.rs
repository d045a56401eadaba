//! HTTP handlers. Each one maps a request onto a single ledger operation.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_core::{Block, ChainResponse, LedgerError, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

pub enum ApiError {
    Ledger(LedgerError),
    /// Body missing, not JSON, or the wrong shape.
    Body(JsonRejection),
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Body(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(e @ (LedgerError::MissingField(_) | LedgerError::InvalidAddress(_))) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Ledger(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Body(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

/// GET /health
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MineOut {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl From<Block> for MineOut {
    fn from(block: Block) -> Self {
        Self {
            message: "New Block Forged".to_string(),
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

/// GET /mine
pub async fn mine(State(state): State<AppState>) -> Result<Json<MineOut>, ApiError> {
    let ledger = state.ledger.clone();
    let block = tokio::task::spawn_blocking(move || ledger.mine())
        .await
        .map_err(|e| {
            error!("mining task failed: {}", e);
            ApiError::Internal("mining task failed".to_string())
        })?;
    Ok(Json(block.into()))
}

/// All fields optional so a missing one is reported by name.
#[derive(Deserialize, Default)]
pub struct TxIn {
    owner: Option<String>,
    receiver: Option<String>,
    amount: Option<u64>,
    asset_id: Option<String>,
}

impl TryFrom<TxIn> for Transaction {
    type Error = LedgerError;

    fn try_from(tx: TxIn) -> Result<Self, Self::Error> {
        Ok(Transaction {
            owner: tx.owner.ok_or(LedgerError::MissingField("owner"))?,
            receiver: tx.receiver.ok_or(LedgerError::MissingField("receiver"))?,
            amount: tx.amount.ok_or(LedgerError::MissingField("amount"))?,
            asset_id: tx.asset_id.ok_or(LedgerError::MissingField("asset_id"))?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TxOut {
    pub message: String,
    pub index: u64,
}

/// POST /transactions/new
pub async fn new_transaction(
    State(state): State<AppState>,
    payload: Result<Json<TxIn>, JsonRejection>,
) -> Result<(StatusCode, Json<TxOut>), ApiError> {
    let Json(payload) = payload?;
    let tx = Transaction::try_from(payload)?;
    let index = state.ledger.submit_transaction(tx);
    Ok((
        StatusCode::CREATED,
        Json(TxOut {
            message: format!("Transaction will be added to Block {index}"),
            index,
        }),
    ))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PendingOut {
    pub transactions: Vec<Transaction>,
    pub count: usize,
}

/// GET /transactions/pending
pub async fn pending(State(state): State<AppState>) -> Json<PendingOut> {
    let transactions = state.ledger.pending_transactions();
    let count = transactions.len();
    Json(PendingOut { transactions, count })
}

/// GET /chain
pub async fn full_chain(State(state): State<AppState>) -> Json<ChainResponse> {
    Json(state.ledger.chain_response())
}

#[derive(Deserialize)]
pub struct RegisterIn {
    #[serde(default)]
    nodes: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PeersOut {
    pub message: String,
    pub total_nodes: Vec<String>,
}

/// POST /nodes/register
pub async fn register_nodes(
    State(state): State<AppState>,
    payload: Result<Json<RegisterIn>, JsonRejection>,
) -> Result<(StatusCode, Json<PeersOut>), ApiError> {
    let Json(payload) = payload?;
    let nodes = payload
        .nodes
        .filter(|n| !n.is_empty())
        .ok_or(LedgerError::MissingField("nodes"))?;
    let total_nodes = state.ledger.register_peers(nodes.as_slice())?;
    info!("peer set now has {} node(s)", total_nodes.len());
    Ok((
        StatusCode::CREATED,
        Json(PeersOut {
            message: "New nodes have been added".to_string(),
            total_nodes,
        }),
    ))
}

/// GET /nodes
pub async fn list_nodes(State(state): State<AppState>) -> Json<PeersOut> {
    Json(PeersOut {
        message: "Known nodes".to_string(),
        total_nodes: state.ledger.peers(),
    })
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResolveOut {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
    pub length: usize,
}

/// GET /nodes/resolve
pub async fn resolve(State(state): State<AppState>) -> Json<ResolveOut> {
    let replaced = state.resolver.resolve_conflicts(&state.ledger).await;
    let ChainResponse { chain, length } = state.ledger.chain_response();
    let message = if replaced {
        "Current chain was replaced"
    } else {
        "Current chain is authoritative"
    };
    Json(ResolveOut {
        message: message.to_string(),
        replaced,
        chain,
        length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_in_reports_first_missing_field() {
        let full = TxIn {
            owner: Some("alice".into()),
            receiver: Some("bob".into()),
            amount: Some(3),
            asset_id: Some("SN-1".into()),
        };
        assert_eq!(
            Transaction::try_from(full).unwrap(),
            Transaction::new("alice", "bob", 3, "SN-1")
        );

        let missing_amount = TxIn {
            owner: Some("alice".into()),
            receiver: Some("bob".into()),
            asset_id: Some("SN-1".into()),
            ..Default::default()
        };
        assert_eq!(
            Transaction::try_from(missing_amount).unwrap_err(),
            LedgerError::MissingField("amount")
        );
        assert_eq!(
            Transaction::try_from(TxIn::default()).unwrap_err(),
            LedgerError::MissingField("owner")
        );
    }
}
