use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tresor_core::{Category, CategoryRule, RuleId};

use crate::error::ApiResult;
use crate::AppState;

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.ledger.list_categories().await?))
}

pub async fn list_rules(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryRule>>> {
    Ok(Json(state.ledger.find_all_rules().await?))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.ledger.delete_rule(RuleId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
