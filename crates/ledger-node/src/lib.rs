//! HTTP shell around the ledger engine.

pub mod config;
mod constants;
pub mod peer_client;
pub mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use ledger_core::{Ledger, Resolver};
use peer_client::HttpChainSource;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler. The ledger is the only mutator of
/// chain, pool and peers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub resolver: Arc<Resolver<HttpChainSource>>,
}

impl AppState {
    pub fn new(ledger: Ledger, source: HttpChainSource, peer_timeout: std::time::Duration) -> Self {
        Self {
            ledger: Arc::new(ledger),
            resolver: Arc::new(Resolver::new(source).with_timeout(peer_timeout)),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/mine", get(routes::mine))
        .route("/transactions/new", post(routes::new_transaction))
        .route("/transactions/pending", get(routes::pending))
        .route("/chain", get(routes::full_chain))
        .route("/nodes", get(routes::list_nodes))
        .route("/nodes/register", post(routes::register_nodes))
        .route("/nodes/resolve", get(routes::resolve))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
