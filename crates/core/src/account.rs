use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Money;
use super::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Cash,
    Savings,
    Investment,
    Trading,
    Crypto,
    RealEstate,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Cash => write!(f, "CASH"),
            AccountType::Savings => write!(f, "SAVINGS"),
            AccountType::Investment => write!(f, "INVESTMENT"),
            AccountType::Trading => write!(f, "TRADING"),
            AccountType::Crypto => write!(f, "CRYPTO"),
            AccountType::RealEstate => write!(f, "REAL_ESTATE"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(AccountType::Cash),
            "SAVINGS" => Ok(AccountType::Savings),
            "INVESTMENT" => Ok(AccountType::Investment),
            "TRADING" => Ok(AccountType::Trading),
            "CRYPTO" => Ok(AccountType::Crypto),
            "REAL_ESTATE" => Ok(AccountType::RealEstate),
            other => Err(format!("Unknown account type: '{other}'")),
        }
    }
}

pub const DEFAULT_CURRENCY: &str = "EUR";

/// Description given to the synthetic transaction that carries an opening balance.
pub const INITIAL_BALANCE_DESCRIPTION: &str = "Initial Balance";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub institution: String,
    pub currency: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub balance: Money,
    pub is_automated: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for opening an account. A non-zero `initial_balance` is booked as a
/// transaction so the balance always equals the sum of the account's transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub institution: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    #[serde(default)]
    pub initial_balance: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl NewAccount {
    pub fn new(name: &str, institution: &str, account_type: AccountType) -> Self {
        NewAccount {
            name: name.to_string(),
            institution: institution.to_string(),
            account_type,
            initial_balance: None,
            currency: None,
        }
    }

    pub fn with_initial_balance(mut self, balance: Money) -> Self {
        self.initial_balance = Some(balance);
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }
}

/// Balance-neutral edits. The balance itself is only ever moved by transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub institution: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWithTransactions {
    #[serde(flatten)]
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountOrder {
    #[default]
    Name,
    Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Result of recomputing an account's balance from its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAudit {
    pub account_id: AccountId,
    pub stored: Money,
    pub computed: Money,
}

impl BalanceAudit {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.computed
    }

    pub fn drift(&self) -> Money {
        self.stored - self.computed
    }
}
