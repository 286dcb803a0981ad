use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// The record kinds a lookup can miss on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Transaction,
    Category,
    CategoryRule,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Account => write!(f, "Account"),
            Entity::Transaction => write!(f, "Transaction"),
            Entity::Category => write!(f, "Category"),
            Entity::CategoryRule => write!(f, "Category rule"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{0} not found: {1}")]
    NotFound(Entity, i64),
    #[error("Transaction description must not be empty")]
    EmptyDescription,
    #[error("Account name must not be empty")]
    EmptyAccountName,
    #[error("Rule keyword must not be empty")]
    EmptyKeyword,
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(Decimal),
    #[error("Date out of range: {0}")]
    DateOutOfRange(DateTime<Utc>),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(..))
    }
}
