use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive only: nothing checks it against the sign of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Income => write!(f, "INCOME"),
            CategoryKind::Expense => write!(f, "EXPENSE"),
        }
    }
}

impl FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(CategoryKind::Income),
            "EXPENSE" => Ok(CategoryKind::Expense),
            other => Err(format!("Unknown category kind: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub color: String,
    pub icon: Option<String>,
}

/// A learned association: descriptions containing `keyword` belong to `category_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRule {
    pub id: RuleId,
    pub keyword: String,
    pub category_id: CategoryId,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The fallback category. Seeded with the database and required for the
/// auto-categorizer's fallback path.
pub const OTHER_CATEGORY: &str = "Other";

pub const DEFAULT_CATEGORIES: &[(&str, CategoryKind, &str, &str)] = &[
    ("Salary", CategoryKind::Income, "#10b981", "briefcase"),
    ("Investments", CategoryKind::Income, "#14b8a6", "trending-up"),
    ("Groceries", CategoryKind::Expense, "#f97316", "shopping-cart"),
    ("Restaurants", CategoryKind::Expense, "#ef4444", "utensils"),
    ("Transport", CategoryKind::Expense, "#3b82f6", "car"),
    ("Housing", CategoryKind::Expense, "#8b5cf6", "home"),
    ("Utilities", CategoryKind::Expense, "#6366f1", "zap"),
    ("Subscriptions", CategoryKind::Expense, "#ec4899", "repeat"),
    ("Health", CategoryKind::Expense, "#22c55e", "heart-pulse"),
    ("Leisure", CategoryKind::Expense, "#eab308", "gamepad-2"),
    ("Shopping", CategoryKind::Expense, "#f43f5e", "shopping-bag"),
    (OTHER_CATEGORY, CategoryKind::Expense, "#94a3b8", "circle-help"),
];
