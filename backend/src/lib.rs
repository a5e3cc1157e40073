//! Trading Ledger - inventory allocation and settlement backend
//!
//! Tracks purchased stock as it is graded into sellable sorts, allocates that
//! stock and reusable fibers to sales, and keeps an append-only payment ledger
//! per counterparty.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use store::{LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore, SharedStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: SharedStore, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root() -> &'static str {
    "Trading Ledger API v1"
}
