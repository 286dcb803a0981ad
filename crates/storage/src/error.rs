use std::time::Duration;
use thiserror::Error;
use tresor_core::{Entity, LedgerError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Import did not finish within {0:?}; nothing was written")]
    Timeout(Duration),
    #[error("Corrupt {table} row: {detail}")]
    CorruptRow { table: &'static str, detail: String },
}

impl StoreError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        StoreError::Ledger(LedgerError::NotFound(entity, id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Ledger(e) if e.is_not_found())
    }
}
