use axum::{
    extract::{Query, State},
    Json,
};
use tresor_core::summary::{expense_breakdown, monthly_cash_flow, ExpenseSlice, MonthlyCashFlow};

use super::params::RangeParams;
use crate::error::ApiResult;
use crate::AppState;

pub async fn cash_flow(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<Vec<MonthlyCashFlow>>> {
    let transactions = state.ledger.list_transactions(params.range()?).await?;
    Ok(Json(monthly_cash_flow(&transactions)))
}

pub async fn expenses(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<Vec<ExpenseSlice>>> {
    let transactions = state.ledger.list_transactions(params.range()?).await?;
    let categories = state.ledger.list_categories().await?;
    Ok(Json(expense_breakdown(&transactions, &categories)))
}
