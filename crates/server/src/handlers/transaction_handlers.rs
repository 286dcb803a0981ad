use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use tresor_core::{AccountId, DraftTransaction, NewTransaction, Transaction, TransactionId, TransactionUpdate};
use tresor_import::{normalize_with_limits, SkippedRow};
use tresor_storage::ImportSummary;

use super::params::RangeParams;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportResponse {
    #[serde(flatten)]
    pub summary: ImportSummary,
    pub skipped: Vec<SkippedRow>,
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<Vec<Transaction>>> {
    Ok(Json(state.ledger.list_transactions(params.range()?).await?))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(input): Json<NewTransaction>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let created = state.ledger.create_transaction(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<TransactionUpdate>,
) -> ApiResult<Json<Transaction>> {
    Ok(Json(state.ledger.update_transaction(TransactionId(id), update).await?))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.ledger.delete_transaction(TransactionId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drafts already reviewed client-side.
pub async fn import_drafts(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(drafts): Json<Vec<DraftTransaction>>,
) -> ApiResult<Json<ImportSummary>> {
    if drafts.len() > state.limits.max_rows {
        return Err(ApiError::BadRequest(format!(
            "At most {} transactions can be imported at once",
            state.limits.max_rows
        )));
    }
    let summary = state.ledger.import_transactions(AccountId(account_id), &drafts).await?;
    Ok(Json(summary))
}

/// Raw bank export in the request body.
pub async fn import_csv(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<CsvImportResponse>> {
    let limits = state.limits;
    let statement = tokio::task::spawn_blocking(move || normalize_with_limits(&body, &limits))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "CSV normalization task failed");
            ApiError::Internal
        })??;

    if !statement.skipped.is_empty() {
        info!(
            account = account_id,
            skipped = statement.skipped.len(),
            "Statement rows skipped during normalization"
        );
    }

    let summary = state
        .ledger
        .import_transactions(AccountId(account_id), &statement.drafts)
        .await?;
    Ok(Json(CsvImportResponse {
        summary,
        skipped: statement.skipped,
    }))
}
