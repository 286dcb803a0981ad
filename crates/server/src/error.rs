use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tresor_core::LedgerError;
use tresor_import::CsvError;
use tresor_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("CSV {stage} error: {0}", stage = .0.stage())]
    Csv(#[from] CsvError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Store(StoreError::Ledger(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::Ledger(LedgerError::NotFound(..))) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Ledger(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(StoreError::Timeout(_)) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Store(StoreError::Database(_) | StoreError::CorruptRow { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Csv(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            match self {
                ApiError::Store(_) => "Internal database error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
