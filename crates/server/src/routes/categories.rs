use axum::{
    routing::{delete, get},
    Router,
};

use crate::handlers;
use crate::AppState;

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(handlers::list_categories))
        .route("/category-rules", get(handlers::list_rules))
        .route("/category-rules/{id}", delete(handlers::delete_rule))
}
