use axum::{routing::get, Router};

use crate::handlers;
use crate::AppState;

pub fn summary_routes() -> Router<AppState> {
    Router::new()
        .route("/summary/cash-flow", get(handlers::cash_flow))
        .route("/summary/expenses", get(handlers::expenses))
}
