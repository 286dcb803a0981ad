use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tresor_core::{Account, AccountId, AccountUpdate, AccountWithTransactions, BalanceAudit, NewAccount};

use super::params::AccountListParams;
use crate::error::ApiResult;
use crate::AppState;

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(params): Query<AccountListParams>,
) -> ApiResult<Json<Vec<AccountWithTransactions>>> {
    let query = params.to_query()?;
    Ok(Json(state.ledger.list_accounts(&query).await?))
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(input): Json<NewAccount>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let account = state.ledger.create_account(input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.ledger.get_account(AccountId(id)).await?))
}

pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<AccountUpdate>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.ledger.update_account(AccountId(id), update).await?))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.ledger.delete_account(AccountId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn audit_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<BalanceAudit>> {
    Ok(Json(state.ledger.audit_balance(AccountId(id)).await?))
}
