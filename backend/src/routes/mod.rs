//! Route definitions for the Trading Ledger API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected_routes().route_layer(middleware::from_fn_with_state(
            state,
            auth_middleware,
        )))
}

/// Everything behind a bearer token
fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/purchases", purchase_routes())
        .nest("/stock-entries", stock_entry_routes())
        .nest("/stock-items", stock_item_routes())
        .nest("/stock-sorts", stock_sort_routes())
        .nest("/fibers", fiber_routes())
        .nest("/sales", sale_routes())
        .nest("/payments", payment_routes())
}

fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_purchase))
        .route(
            "/:purchase_id",
            get(handlers::get_purchase).delete(handlers::delete_purchase),
        )
        .route(
            "/:purchase_id/payments",
            post(handlers::record_purchase_payment),
        )
}

fn stock_entry_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_stock_entry))
        .route(
            "/:stock_entry_id",
            get(handlers::get_stock_entry).delete(handlers::delete_stock_entry),
        )
}

fn stock_item_routes() -> Router<AppState> {
    Router::new().route("/:stock_item_id/sorts", post(handlers::submit_sort))
}

fn stock_sort_routes() -> Router<AppState> {
    Router::new()
        .route("/available", get(handlers::list_available_sorts))
        .route("/:stock_sort_id", get(handlers::get_stock_sort))
}

fn fiber_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_fibers).post(handlers::create_fiber))
        .route(
            "/:fiber_id",
            get(handlers::get_fiber).delete(handlers::delete_fiber),
        )
        .route("/:fiber_id/available", post(handlers::mark_fiber_available))
}

fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_sale))
        .route(
            "/:sale_id",
            get(handlers::get_sale).delete(handlers::delete_sale),
        )
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/balance/:user_id", get(handlers::get_balance))
        .route("/balances", post(handlers::batch_balances))
        .route("/user/:user_id", get(handlers::list_user_payments))
}
