pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tresor_import::ImportLimits;
use tresor_storage::Ledger;

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub limits: ImportLimits,
}

/// The REST API. Request bodies are capped at the upload limit.
pub fn app(state: AppState) -> Router {
    let body_limit = state.limits.max_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .merge(routes::account_routes())
        .merge(routes::transaction_routes())
        .merge(routes::category_routes())
        .merge(routes::summary_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
