pub mod account_handlers;
pub mod category_handlers;
pub mod params;
pub mod summary_handlers;
pub mod transaction_handlers;

pub use account_handlers::*;
pub use category_handlers::*;
pub use summary_handlers::*;
pub use transaction_handlers::*;

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
