//! Spending summaries over already-loaded transactions.
//!
//! These back the dashboard's cash-flow and expense-breakdown charts. They never
//! touch the store and never drop a transaction: spend without a category is
//! reported in its own bucket.

use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::category::{Category, CategoryId};
use crate::money::Money;
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCashFlow {
    pub year: i32,
    pub month: u32,
    pub income: Money,
    pub expense: Money,
}

impl MonthlyCashFlow {
    pub fn net(&self) -> Money {
        self.income - self.expense
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSlice {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub color: Option<String>,
    pub total: Money,
}

/// Income and expense (as a positive figure) per calendar month, oldest first.
pub fn monthly_cash_flow<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Vec<MonthlyCashFlow> {
    let mut months: BTreeMap<(i32, u32), (Money, Money)> = BTreeMap::new();

    for tx in transactions {
        let key = (tx.date.year(), tx.date.month());
        let entry = months.entry(key).or_default();
        if tx.amount.is_negative() {
            entry.1 += tx.amount.abs();
        } else {
            entry.0 += tx.amount;
        }
    }

    months
        .into_iter()
        .map(|((year, month), (income, expense))| MonthlyCashFlow {
            year,
            month,
            income,
            expense,
        })
        .collect()
}

/// Absolute spend per category, largest first. Ties are ordered by name.
pub fn expense_breakdown<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    categories: &[Category],
) -> Vec<ExpenseSlice> {
    let mut totals: BTreeMap<Option<CategoryId>, Money> = BTreeMap::new();

    for tx in transactions.into_iter().filter(|tx| tx.is_expense()) {
        *totals.entry(tx.category_id).or_default() += tx.amount.abs();
    }

    let mut slices: Vec<ExpenseSlice> = totals
        .into_iter()
        .map(|(category_id, total)| {
            let category = category_id.and_then(|id| categories.iter().find(|c| c.id == id));
            ExpenseSlice {
                category_id,
                name: category
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "Uncategorized".to_string()),
                color: category.map(|c| c.color.clone()),
                total,
            }
        })
        .collect();

    slices.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    slices
}
