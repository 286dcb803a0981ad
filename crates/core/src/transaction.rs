use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::account::AccountId;
use super::category::CategoryId;
use super::error::LedgerError;
use super::money::Money;

/// Dates are stored as RFC 3339 text, which only has room for four-digit years.
pub fn ensure_storable_date(date: DateTime<Utc>) -> Result<DateTime<Utc>, LedgerError> {
    if (0..=9999).contains(&date.year()) {
        Ok(date)
    } else {
        Err(LedgerError::DateOutOfRange(date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a transaction came from. Bank-sourced rows arrive through statement import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionSource {
    #[default]
    Manual,
    Bank,
}

impl fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionSource::Manual => write!(f, "MANUAL"),
            TransactionSource::Bank => write!(f, "BANK"),
        }
    }
}

impl FromStr for TransactionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(TransactionSource::Manual),
            "BANK" => Ok(TransactionSource::Bank),
            other => Err(format!("Unknown transaction source: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: Money,
    pub description: String,
    pub date: DateTime<Utc>,
    pub is_recurring: bool,
    pub source: TransactionSource,
    pub category_id: Option<CategoryId>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.amount.is_negative()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub amount: Money,
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub source: TransactionSource,
}

impl NewTransaction {
    pub fn new(account_id: AccountId, amount: Money, description: &str, date: DateTime<Utc>) -> Self {
        NewTransaction {
            account_id,
            amount,
            description: description.to_string(),
            date,
            category_id: None,
            is_recurring: false,
            source: TransactionSource::Manual,
        }
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn recurring(mut self) -> Self {
        self.is_recurring = true;
        self
    }

    /// Trims the description and rejects blank ones.
    pub fn validate(mut self) -> Result<Self, LedgerError> {
        self.description = self.description.trim().to_string();
        if self.description.is_empty() {
            return Err(LedgerError::EmptyDescription);
        }
        ensure_storable_date(self.date)?;
        Ok(self)
    }
}

/// Partial edit of a persisted transaction. The owning account never changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub is_recurring: Option<bool>,
    pub category_id: Option<CategoryId>,
    pub amount: Option<Money>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.date.is_none()
            && self.is_recurring.is_none()
            && self.category_id.is_none()
            && self.amount.is_none()
    }

    pub fn validate(mut self) -> Result<Self, LedgerError> {
        if let Some(description) = self.description.take() {
            let description = description.trim();
            if description.is_empty() {
                return Err(LedgerError::EmptyDescription);
            }
            self.description = Some(description.to_string());
        }
        if let Some(date) = self.date {
            ensure_storable_date(date)?;
        }
        Ok(self)
    }
}

/// A statement row that parsed cleanly but has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftTransaction {
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Money,
}

impl DraftTransaction {
    pub fn new(date: NaiveDate, description: &str, amount: Money) -> Self {
        DraftTransaction {
            date: date.and_time(chrono::NaiveTime::MIN).and_utc(),
            description: description.to_string(),
            amount,
        }
    }
}
