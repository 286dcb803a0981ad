use axum::{routing::get, Router};

use crate::handlers;
use crate::AppState;

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        .route(
            "/accounts/{id}",
            get(handlers::get_account)
                .patch(handlers::update_account)
                .delete(handlers::delete_account),
        )
        .route("/accounts/{id}/audit", get(handlers::audit_account))
}
