//! Record-level SQL. Every function takes a bare connection so the ledger can
//! run several of them inside one store transaction (`&mut *tx`) or on a pooled
//! connection (`&mut *conn`).

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tresor_core::{
    Account, AccountId, AccountOrder, AccountUpdate, Category, CategoryId, CategoryRule,
    DateRange, Entity, LedgerError, Money, RuleId, SortDirection, Transaction, TransactionId,
    TransactionSource, OTHER_CATEGORY,
};

use crate::error::StoreError;

const ACCOUNT_COLUMNS: &str =
    "id, name, institution, currency, account_type, balance_cents, is_automated, created_at";

const TRANSACTION_COLUMNS: &str =
    "id, account_id, amount_cents, description, date, is_recurring, source, category_id, created_at";

pub(crate) fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(table: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            detail: format!("bad timestamp '{raw}': {e}"),
        })
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    institution: String,
    currency: String,
    account_type: String,
    balance_cents: i64,
    is_automated: bool,
    created_at: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let account_type = row
            .account_type
            .parse()
            .map_err(|detail| StoreError::CorruptRow { table: "accounts", detail })?;
        Ok(Account {
            id: AccountId(row.id),
            name: row.name,
            institution: row.institution,
            currency: row.currency,
            account_type,
            balance: Money::from_cents(row.balance_cents),
            is_automated: row.is_automated,
            created_at: Some(parse_timestamp("accounts", &row.created_at)?),
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    account_id: i64,
    amount_cents: i64,
    description: String,
    date: String,
    is_recurring: bool,
    source: String,
    category_id: Option<i64>,
    created_at: String,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let source = row
            .source
            .parse()
            .map_err(|detail| StoreError::CorruptRow { table: "transactions", detail })?;
        Ok(Transaction {
            id: TransactionId(row.id),
            account_id: AccountId(row.account_id),
            amount: Money::from_cents(row.amount_cents),
            description: row.description,
            date: parse_timestamp("transactions", &row.date)?,
            is_recurring: row.is_recurring,
            source,
            category_id: row.category_id.map(CategoryId),
            created_at: Some(parse_timestamp("transactions", &row.created_at)?),
        })
    }
}

fn rule_from_row(
    (id, keyword, category_id, created_at, updated_at): (i64, String, i64, String, String),
) -> Result<CategoryRule, StoreError> {
    Ok(CategoryRule {
        id: RuleId(id),
        keyword,
        category_id: CategoryId(category_id),
        created_at: Some(parse_timestamp("category_rules", &created_at)?),
        updated_at: Some(parse_timestamp("category_rules", &updated_at)?),
    })
}

// ── Accounts ──────────────────────────────────────────────────────────────────

/// Inserts an account with a zero balance. Opening balances are booked as
/// transactions by the ledger.
pub async fn insert_account(
    conn: &mut SqliteConnection,
    name: &str,
    institution: &str,
    account_type: &str,
    currency: &str,
) -> Result<AccountId, StoreError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO accounts (name, institution, account_type, currency) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(institution)
    .bind(account_type)
    .bind(currency)
    .fetch_one(conn)
    .await?;
    Ok(AccountId(id))
}

pub async fn fetch_account(
    conn: &mut SqliteConnection,
    id: AccountId,
) -> Result<Option<Account>, StoreError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
    sqlx::query_as::<_, AccountRow>(&sql)
        .bind(id.0)
        .fetch_optional(conn)
        .await?
        .map(Account::try_from)
        .transpose()
}

pub async fn fetch_accounts(
    conn: &mut SqliteConnection,
    order: AccountOrder,
) -> Result<Vec<Account>, StoreError> {
    let order_clause = match order {
        AccountOrder::Name => "name COLLATE NOCASE ASC, id ASC",
        AccountOrder::Balance => "balance_cents DESC, id ASC",
    };
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY {order_clause}");
    sqlx::query_as::<_, AccountRow>(&sql)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(Account::try_from)
        .collect()
}

/// Applies the present fields of `update`. Returns the number of rows touched.
pub async fn update_account_fields(
    conn: &mut SqliteConnection,
    id: AccountId,
    update: &AccountUpdate,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE accounts SET
            name = COALESCE(?, name),
            institution = COALESCE(?, institution),
            account_type = COALESCE(?, account_type),
            currency = COALESCE(?, currency)
        WHERE id = ?
        "#,
    )
    .bind(update.name.as_deref())
    .bind(update.institution.as_deref())
    .bind(update.account_type.map(|t| t.to_string()))
    .bind(update.currency.as_deref())
    .bind(id.0)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_account_row(conn: &mut SqliteConnection, id: AccountId) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(id.0)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Atomic `balance += delta`. Fails with `NotFound` unless exactly one row moved.
pub async fn increment_balance(
    conn: &mut SqliteConnection,
    id: AccountId,
    delta_cents: i64,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE accounts SET balance_cents = balance_cents + ? WHERE id = ?")
        .bind(delta_cents)
        .bind(id.0)
        .execute(conn)
        .await?;

    if result.rows_affected() != 1 {
        return Err(StoreError::not_found(Entity::Account, id.0));
    }
    Ok(())
}

pub async fn sum_account_transactions(
    conn: &mut SqliteConnection,
    id: AccountId,
) -> Result<i64, StoreError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions WHERE account_id = ?",
    )
    .bind(id.0)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

// ── Transactions ──────────────────────────────────────────────────────────────

/// A transaction about to be written. Amounts are already in cents.
pub struct TransactionRecord<'a> {
    pub account_id: AccountId,
    pub amount_cents: i64,
    pub description: &'a str,
    pub date: DateTime<Utc>,
    pub is_recurring: bool,
    pub source: TransactionSource,
    pub category_id: Option<CategoryId>,
}

pub async fn insert_transaction(
    conn: &mut SqliteConnection,
    record: &TransactionRecord<'_>,
) -> Result<Transaction, StoreError> {
    let sql = format!(
        "INSERT INTO transactions (account_id, amount_cents, description, date, is_recurring, source, category_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {TRANSACTION_COLUMNS}"
    );
    let row = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(record.account_id.0)
        .bind(record.amount_cents)
        .bind(record.description)
        .bind(format_timestamp(record.date))
        .bind(record.is_recurring)
        .bind(record.source.to_string())
        .bind(record.category_id.map(|c| c.0))
        .fetch_one(conn)
        .await?;
    Transaction::try_from(row)
}

pub async fn fetch_transaction(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<Option<Transaction>, StoreError> {
    let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?");
    sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(id.0)
        .fetch_optional(conn)
        .await?
        .map(Transaction::try_from)
        .transpose()
}

/// Optional narrowing for [`fetch_transactions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    pub account_id: Option<AccountId>,
    pub range: Option<DateRange>,
    pub direction: SortDirection,
}

pub async fn fetch_transactions(
    conn: &mut SqliteConnection,
    filter: &TransactionFilter,
) -> Result<Vec<Transaction>, StoreError> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1 = 1"));

    if let Some(account_id) = filter.account_id {
        builder.push(" AND account_id = ").push_bind(account_id.0);
    }
    if let Some(range) = filter.range {
        builder
            .push(" AND date >= ")
            .push_bind(format_timestamp(range.start_instant()));
        if let Some(end) = range.end_instant_exclusive() {
            builder.push(" AND date < ").push_bind(format_timestamp(end));
        }
    }
    builder.push(match filter.direction {
        SortDirection::Desc => " ORDER BY date DESC, id DESC",
        SortDirection::Asc => " ORDER BY date ASC, id ASC",
    });

    builder
        .build_query_as::<TransactionRow>()
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
}

/// Field changes for an existing transaction; `None` leaves a column as is.
#[derive(Debug, Default)]
pub struct TransactionChanges<'a> {
    pub description: Option<&'a str>,
    pub date: Option<DateTime<Utc>>,
    pub is_recurring: Option<bool>,
    pub category_id: Option<CategoryId>,
    pub amount_cents: Option<i64>,
}

pub async fn update_transaction_fields(
    conn: &mut SqliteConnection,
    id: TransactionId,
    changes: &TransactionChanges<'_>,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET
            description = COALESCE(?, description),
            date = COALESCE(?, date),
            is_recurring = COALESCE(?, is_recurring),
            category_id = COALESCE(?, category_id),
            amount_cents = COALESCE(?, amount_cents)
        WHERE id = ?
        "#,
    )
    .bind(changes.description)
    .bind(changes.date.map(format_timestamp))
    .bind(changes.is_recurring)
    .bind(changes.category_id.map(|c| c.0))
    .bind(changes.amount_cents)
    .bind(id.0)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_transaction_row(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
        .bind(id.0)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_account_transactions(
    conn: &mut SqliteConnection,
    account_id: AccountId,
) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM transactions WHERE account_id = ?")
        .bind(account_id.0)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

// ── Categories ────────────────────────────────────────────────────────────────

pub async fn fetch_categories(conn: &mut SqliteConnection) -> Result<Vec<Category>, StoreError> {
    let rows = sqlx::query_as::<_, (i64, String, String, String, Option<String>)>(
        "SELECT id, name, kind, color, icon FROM categories ORDER BY name",
    )
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|(id, name, kind, color, icon)| {
            let kind = kind
                .parse()
                .map_err(|detail| StoreError::CorruptRow { table: "categories", detail })?;
            Ok(Category {
                id: CategoryId(id),
                name,
                kind,
                color,
                icon,
            })
        })
        .collect()
}

pub async fn category_exists(conn: &mut SqliteConnection, id: CategoryId) -> Result<bool, StoreError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ?")
        .bind(id.0)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// The fallback category's id, if it still exists.
pub async fn other_category_id(conn: &mut SqliteConnection) -> Result<Option<CategoryId>, StoreError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
        .bind(OTHER_CATEGORY)
        .fetch_optional(conn)
        .await?;
    Ok(id.map(CategoryId))
}

// ── Category rules ────────────────────────────────────────────────────────────

/// All rules, oldest first. This is the order the matcher tries them in.
pub async fn fetch_rules(conn: &mut SqliteConnection) -> Result<Vec<CategoryRule>, StoreError> {
    sqlx::query_as::<_, (i64, String, i64, String, String)>(
        "SELECT id, keyword, category_id, created_at, updated_at FROM category_rules ORDER BY id",
    )
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(rule_from_row)
    .collect()
}

/// Creates the rule for `keyword` or repoints it at `category_id`. The keyword
/// is stored trimmed and lower-cased.
pub async fn upsert_rule(
    conn: &mut SqliteConnection,
    keyword: &str,
    category_id: CategoryId,
) -> Result<CategoryRule, StoreError> {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return Err(LedgerError::EmptyKeyword.into());
    }

    let row = sqlx::query_as::<_, (i64, String, i64, String, String)>(
        r#"
        INSERT INTO category_rules (keyword, category_id) VALUES (?, ?)
        ON CONFLICT(keyword) DO UPDATE SET
            category_id = excluded.category_id,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        RETURNING id, keyword, category_id, created_at, updated_at
        "#,
    )
    .bind(&keyword)
    .bind(category_id.0)
    .fetch_one(conn)
    .await?;

    rule_from_row(row)
}

pub async fn delete_rule(conn: &mut SqliteConnection, id: RuleId) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM category_rules WHERE id = ?")
        .bind(id.0)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
