use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers;
use crate::AppState;

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/{id}",
            patch(handlers::update_transaction).delete(handlers::delete_transaction),
        )
        // {id} is the target account for imports
        .route("/transactions/{id}/import", post(handlers::import_drafts))
        .route("/transactions/{id}/import/csv", post(handlers::import_csv))
}
