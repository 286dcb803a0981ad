//! The ledger mutator. Every write that moves money goes through here so that
//! an account's stored balance always equals the sum of its transactions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use tresor_core::{
    ensure_storable_date, Account, AccountId, AccountOrder, AccountUpdate,
    AccountWithTransactions, BalanceAudit, Category, CategoryId, CategoryRule, DateRange,
    DraftTransaction, Entity, LedgerError, Money, NewAccount, NewTransaction, RuleId,
    SortDirection, Transaction, TransactionId, TransactionSource, TransactionUpdate,
    DEFAULT_CURRENCY, INITIAL_BALANCE_DESCRIPTION,
};
use tresor_import::{derive_keyword, Resolution, RuleMatcher, PLACEHOLDER_DESCRIPTION};

use crate::db::DbPool;
use crate::error::StoreError;
use crate::queries::{self, TransactionChanges, TransactionFilter, TransactionRecord};

pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for [`Ledger::list_accounts`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccountQuery {
    pub range: Option<DateRange>,
    #[serde(default)]
    pub order_by: AccountOrder,
    #[serde(default)]
    pub transactions_order: SortDirection,
}

/// Outcome of a committed statement import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub inserted: usize,
    pub total: Money,
    pub matched_by_rule: usize,
    pub fallback: usize,
    pub uncategorized: usize,
}

impl ImportSummary {
    fn record(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Rule { .. } => self.matched_by_rule += 1,
            Resolution::Fallback => self.fallback += 1,
            Resolution::Uncategorized => self.uncategorized += 1,
            Resolution::Explicit => {}
        }
    }
}

#[derive(Clone)]
pub struct Ledger {
    pool: DbPool,
    import_timeout: Duration,
}

impl Ledger {
    pub fn new(pool: DbPool) -> Self {
        Ledger {
            pool,
            import_timeout: DEFAULT_IMPORT_TIMEOUT,
        }
    }

    pub fn with_import_timeout(mut self, timeout: Duration) -> Self {
        self.import_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // ── Accounts ──────────────────────────────────────────────────────────────

    pub async fn create_account(&self, input: NewAccount) -> Result<Account, StoreError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyAccountName.into());
        }
        let currency = input.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
        let initial = input.initial_balance.unwrap_or_default();
        let initial_cents = initial.to_cents()?;

        let mut tx = self.pool.begin().await?;
        let id = queries::insert_account(
            &mut tx,
            name,
            input.institution.trim(),
            &input.account_type.to_string(),
            currency,
        )
        .await?;

        if initial_cents != 0 {
            let record = TransactionRecord {
                account_id: id,
                amount_cents: initial_cents,
                description: INITIAL_BALANCE_DESCRIPTION,
                date: Utc::now(),
                is_recurring: false,
                source: TransactionSource::Manual,
                category_id: None,
            };
            queries::insert_transaction(&mut tx, &record).await?;
            queries::increment_balance(&mut tx, id, initial_cents).await?;
        }

        let account = require_account(&mut tx, id).await?;
        tx.commit().await?;

        info!(account = %id, balance = %account.balance, "Created account");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await?;
        require_account(&mut conn, id).await
    }

    /// Accounts with their transactions embedded, filtered and ordered per `query`.
    pub async fn list_accounts(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<AccountWithTransactions>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let accounts = queries::fetch_accounts(&mut conn, query.order_by).await?;
        let filter = TransactionFilter {
            account_id: None,
            range: query.range,
            direction: query.transactions_order,
        };
        let mut by_account: HashMap<AccountId, Vec<Transaction>> = HashMap::new();
        for tx in queries::fetch_transactions(&mut conn, &filter).await? {
            by_account.entry(tx.account_id).or_default().push(tx);
        }

        Ok(accounts
            .into_iter()
            .map(|account| AccountWithTransactions {
                transactions: by_account.remove(&account.id).unwrap_or_default(),
                account,
            })
            .collect())
    }

    /// Edits descriptive fields. The balance is never touched here.
    pub async fn update_account(
        &self,
        id: AccountId,
        update: AccountUpdate,
    ) -> Result<Account, StoreError> {
        let mut update = update;
        if let Some(name) = update.name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(LedgerError::EmptyAccountName.into());
            }
        }

        let mut tx = self.pool.begin().await?;
        if queries::update_account_fields(&mut tx, id, &update).await? == 0 {
            return Err(StoreError::not_found(Entity::Account, id.0));
        }
        let account = require_account(&mut tx, id).await?;
        tx.commit().await?;
        Ok(account)
    }

    /// Removes the account and every transaction it owns as one unit.
    pub async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let removed = queries::delete_account_transactions(&mut tx, id).await?;
        if queries::delete_account_row(&mut tx, id).await? != 1 {
            return Err(StoreError::not_found(Entity::Account, id.0));
        }
        tx.commit().await?;

        info!(account = %id, transactions = removed, "Deleted account");
        Ok(())
    }

    /// Recomputes the balance from the account's transactions and compares it
    /// with the stored figure.
    pub async fn audit_balance(&self, id: AccountId) -> Result<BalanceAudit, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let account = require_account(&mut conn, id).await?;
        let computed = queries::sum_account_transactions(&mut conn, id).await?;

        let audit = BalanceAudit {
            account_id: id,
            stored: account.balance,
            computed: Money::from_cents(computed),
        };
        if !audit.is_consistent() {
            warn!(account = %id, drift = %audit.drift(), "Stored balance disagrees with transactions");
        }
        Ok(audit)
    }

    // ── Transactions ──────────────────────────────────────────────────────────

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, StoreError> {
        let mut conn = self.pool.acquire().await?;
        require_transaction(&mut conn, id).await
    }

    /// Newest first.
    pub async fn list_transactions(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let filter = TransactionFilter {
            range,
            ..TransactionFilter::default()
        };
        queries::fetch_transactions(&mut conn, &filter).await
    }

    pub async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, StoreError> {
        let input = input.validate()?;
        let amount_cents = input.amount.to_cents()?;

        let mut tx = self.pool.begin().await?;
        require_account(&mut tx, input.account_id).await?;

        let (category_id, resolution) =
            resolve_category(&mut tx, &input.description, input.category_id).await?;
        debug!(description = %input.description, ?resolution, "Categorized transaction");

        let record = TransactionRecord {
            account_id: input.account_id,
            amount_cents,
            description: &input.description,
            date: input.date,
            is_recurring: input.is_recurring,
            source: input.source,
            category_id,
        };
        let created = queries::insert_transaction(&mut tx, &record).await?;
        queries::increment_balance(&mut tx, input.account_id, amount_cents).await?;
        tx.commit().await?;

        if let Some(category_id) = input.category_id {
            self.learn_or_warn(&created.description, category_id).await;
        }
        Ok(created)
    }

    /// Partial edit. An amount change moves the owning account's balance by
    /// `new - old` in the same unit.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        update: TransactionUpdate,
    ) -> Result<Transaction, StoreError> {
        let update = update.validate()?;
        let description = update.description.as_deref();
        let new_cents = update.amount.map(|amount| amount.to_cents()).transpose()?;

        let mut tx = self.pool.begin().await?;
        let current = require_transaction(&mut tx, id).await?;
        if let Some(category_id) = update.category_id {
            require_category(&mut tx, category_id).await?;
        }

        let changes = TransactionChanges {
            description,
            date: update.date,
            is_recurring: update.is_recurring,
            category_id: update.category_id,
            amount_cents: new_cents,
        };
        queries::update_transaction_fields(&mut tx, id, &changes).await?;

        if let Some(new_cents) = new_cents {
            let old_cents = current.amount.to_cents()?;
            let delta = new_cents
                .checked_sub(old_cents)
                .ok_or_else(|| {
                    LedgerError::AmountOutOfRange((Money::from_cents(new_cents) - current.amount).into())
                })?;
            if delta != 0 {
                queries::increment_balance(&mut tx, current.account_id, delta).await?;
            }
        }

        let updated = require_transaction(&mut tx, id).await?;
        tx.commit().await?;

        if let Some(category_id) = update.category_id {
            self.learn_or_warn(&updated.description, category_id).await;
        }
        Ok(updated)
    }

    pub async fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let current = require_transaction(&mut tx, id).await?;
        let cents = current.amount.to_cents()?;

        queries::increment_balance(&mut tx, current.account_id, -cents).await?;
        if queries::delete_transaction_row(&mut tx, id).await? != 1 {
            return Err(StoreError::not_found(Entity::Transaction, id.0));
        }
        tx.commit().await?;

        info!(transaction = %id, account = %current.account_id, amount = %current.amount, "Deleted transaction");
        Ok(())
    }

    /// Persists a batch of drafts as bank transactions: all of them with one
    /// aggregate balance change, or none of them.
    pub async fn import_transactions(
        &self,
        account_id: AccountId,
        drafts: &[DraftTransaction],
    ) -> Result<ImportSummary, StoreError> {
        match tokio::time::timeout(self.import_timeout, self.import_unit(account_id, drafts)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(account = %account_id, rows = drafts.len(), "Import timed out and was rolled back");
                Err(StoreError::Timeout(self.import_timeout))
            }
        }
    }

    async fn import_unit(
        &self,
        account_id: AccountId,
        drafts: &[DraftTransaction],
    ) -> Result<ImportSummary, StoreError> {
        let cents = drafts
            .iter()
            .map(|draft| {
                ensure_storable_date(draft.date)?;
                draft.amount.to_cents()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let total_cents = cents
            .iter()
            .try_fold(0i64, |acc, c| acc.checked_add(*c))
            .ok_or_else(|| LedgerError::AmountOutOfRange(drafts.iter().map(|d| d.amount).sum::<Money>().into()))?;

        let mut tx = self.pool.begin().await?;
        require_account(&mut tx, account_id).await?;
        let matcher = RuleMatcher::new(queries::fetch_rules(&mut tx).await?);
        let other = fallback_category(&mut tx).await?;

        let mut summary = ImportSummary::default();
        for (draft, amount_cents) in drafts.iter().zip(cents) {
            let description = match draft.description.trim() {
                "" => PLACEHOLDER_DESCRIPTION,
                trimmed => trimmed,
            };
            let (category_id, resolution) = matcher.categorize(description, other);
            summary.record(resolution);

            let record = TransactionRecord {
                account_id,
                amount_cents,
                description,
                date: draft.date,
                is_recurring: false,
                source: TransactionSource::Bank,
                category_id,
            };
            queries::insert_transaction(&mut tx, &record).await?;
            summary.inserted += 1;
        }

        queries::increment_balance(&mut tx, account_id, total_cents).await?;
        tx.commit().await?;

        summary.total = Money::from_cents(total_cents);
        info!(
            account = %account_id,
            inserted = summary.inserted,
            total = %summary.total,
            matched = summary.matched_by_rule,
            fallback = summary.fallback,
            "Imported bank transactions"
        );
        Ok(summary)
    }

    // ── Categories and rules ──────────────────────────────────────────────────

    /// Sorted by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_categories(&mut conn).await
    }

    pub async fn find_all_rules(&self) -> Result<Vec<CategoryRule>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        queries::fetch_rules(&mut conn).await
    }

    pub async fn upsert_rule(
        &self,
        keyword: &str,
        category_id: CategoryId,
    ) -> Result<CategoryRule, StoreError> {
        let mut conn = self.pool.acquire().await?;
        require_category(&mut conn, category_id).await?;
        queries::upsert_rule(&mut conn, keyword, category_id).await
    }

    pub async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        if queries::delete_rule(&mut conn, id).await? == 0 {
            return Err(StoreError::not_found(Entity::CategoryRule, id.0));
        }
        Ok(())
    }

    /// Learn mode: remembers that descriptions starting like `description`
    /// belong to `category_id`. Returns `None` when no usable keyword exists.
    pub async fn learn(
        &self,
        description: &str,
        category_id: CategoryId,
    ) -> Result<Option<CategoryRule>, StoreError> {
        let Some(keyword) = derive_keyword(description) else {
            debug!(description, "No keyword worth learning");
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        let rule = queries::upsert_rule(&mut conn, &keyword, category_id).await?;
        debug!(keyword = %rule.keyword, category = %category_id, "Learned category rule");
        Ok(Some(rule))
    }

    async fn learn_or_warn(&self, description: &str, category_id: CategoryId) {
        if let Err(e) = self.learn(description, category_id).await {
            warn!(error = %e, description, category = %category_id, "Failed to learn category rule");
        }
    }
}

async fn require_account(conn: &mut SqliteConnection, id: AccountId) -> Result<Account, StoreError> {
    queries::fetch_account(conn, id)
        .await?
        .ok_or_else(|| StoreError::not_found(Entity::Account, id.0))
}

async fn require_transaction(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<Transaction, StoreError> {
    queries::fetch_transaction(conn, id)
        .await?
        .ok_or_else(|| StoreError::not_found(Entity::Transaction, id.0))
}

async fn require_category(conn: &mut SqliteConnection, id: CategoryId) -> Result<(), StoreError> {
    if queries::category_exists(conn, id).await? {
        Ok(())
    } else {
        Err(StoreError::not_found(Entity::Category, id.0))
    }
}

/// An explicit category wins; otherwise match mode with the fallback.
async fn resolve_category(
    conn: &mut SqliteConnection,
    description: &str,
    explicit: Option<CategoryId>,
) -> Result<(Option<CategoryId>, Resolution), StoreError> {
    if let Some(category_id) = explicit {
        require_category(conn, category_id).await?;
        return Ok((Some(category_id), Resolution::Explicit));
    }
    let matcher = RuleMatcher::new(queries::fetch_rules(conn).await?);
    let other = fallback_category(conn).await?;
    Ok(matcher.categorize(description, other))
}

async fn fallback_category(conn: &mut SqliteConnection) -> Result<Option<CategoryId>, StoreError> {
    let other = queries::other_category_id(conn).await?;
    if other.is_none() {
        warn!("Fallback category is missing; unmatched transactions stay uncategorized");
    }
    Ok(other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_in_memory_db;
    use chrono::{DateTime, NaiveDate, TimeZone};
    use proptest::prelude::*;
    use tresor_core::{AccountType, OTHER_CATEGORY};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    async fn ledger() -> Ledger {
        Ledger::new(create_in_memory_db().await.unwrap())
    }

    async fn open_account(ledger: &Ledger, initial_cents: i64) -> AccountId {
        let input = NewAccount::new("Compte courant", "SG", AccountType::Cash)
            .with_initial_balance(Money::from_cents(initial_cents));
        ledger.create_account(input).await.unwrap().id
    }

    async fn category_named(ledger: &Ledger, name: &str) -> CategoryId {
        ledger
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
            .id
    }

    async fn assert_balanced(ledger: &Ledger, account: AccountId) {
        let audit = ledger.audit_balance(account).await.unwrap();
        assert!(audit.is_consistent(), "drift {} on {}", audit.drift(), account);
    }

    fn draft(d: u32, description: &str, cents: i64) -> DraftTransaction {
        DraftTransaction::new(
            NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            description,
            Money::from_cents(cents),
        )
    }

    // ── Accounts ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn initial_balance_is_booked_as_a_transaction() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 150_000).await;

        let stored = ledger.get_account(account).await.unwrap();
        assert_eq!(stored.balance, Money::from_cents(150_000));
        assert_eq!(stored.currency, DEFAULT_CURRENCY);

        let txs = ledger.list_transactions(None).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].description, INITIAL_BALANCE_DESCRIPTION);
        assert_eq!(txs[0].source, TransactionSource::Manual);
        assert!(txs[0].category_id.is_none());
        assert_balanced(&ledger, account).await;
    }

    #[tokio::test]
    async fn zero_initial_balance_books_nothing() {
        let ledger = ledger().await;
        open_account(&ledger, 0).await;
        assert!(ledger.list_transactions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_account_name_is_rejected() {
        let ledger = ledger().await;
        let err = ledger
            .create_account(NewAccount::new("  ", "SG", AccountType::Cash))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::EmptyAccountName)));
    }

    #[tokio::test]
    async fn update_account_never_touches_balance() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 1_000).await;
        let update = AccountUpdate {
            name: Some("Livret A".to_string()),
            account_type: Some(AccountType::Savings),
            ..Default::default()
        };
        let updated = ledger.update_account(account, update).await.unwrap();
        assert_eq!(updated.name, "Livret A");
        assert_eq!(updated.account_type, AccountType::Savings);
        assert_eq!(updated.institution, "SG");
        assert_eq!(updated.balance, Money::from_cents(1_000));

        let err = ledger
            .update_account(AccountId(999), AccountUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn deleting_an_account_removes_its_transactions() {
        let ledger = ledger().await;
        let doomed = open_account(&ledger, 10_000).await;
        let kept = open_account(&ledger, 500).await;
        ledger
            .create_transaction(NewTransaction::new(doomed, Money::from_cents(-200), "Bakery", day(3)))
            .await
            .unwrap();

        ledger.delete_account(doomed).await.unwrap();

        assert!(ledger.get_account(doomed).await.unwrap_err().is_not_found());
        let remaining = ledger.list_transactions(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].account_id, kept);
        assert!(ledger.delete_account(doomed).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_accounts_embeds_filtered_transactions() {
        let ledger = ledger().await;
        let small = open_account(&ledger, 0).await;
        let big = ledger
            .create_account(
                NewAccount::new("Assurance vie", "Linxea", AccountType::Investment)
                    .with_initial_balance(Money::from_cents(900_000)),
            )
            .await
            .unwrap()
            .id;
        for (d, desc) in [(1, "early"), (20, "late")] {
            ledger
                .create_transaction(NewTransaction::new(small, Money::from_cents(100), desc, day(d)))
                .await
                .unwrap();
        }

        let query = AccountQuery {
            range: DateRange::month(2024, 3),
            order_by: AccountOrder::Balance,
            transactions_order: SortDirection::Asc,
        };
        let accounts = ledger.list_accounts(&query).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].account.id, big);
        // The opening balance was booked today, outside March 2024.
        assert!(accounts[0].transactions.is_empty());
        let descriptions: Vec<_> = accounts[1].transactions.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, ["early", "late"]);
    }

    // ── Transactions ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_then_delete_restores_balance() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 10_000).await;

        let tx = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-4_520), "Carrefour", day(15)))
            .await
            .unwrap();
        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(5_480));

        ledger.delete_transaction(tx.id).await.unwrap();
        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(10_000));
        assert!(ledger.get_transaction(tx.id).await.unwrap_err().is_not_found());
        assert!(ledger.delete_transaction(tx.id).await.unwrap_err().is_not_found());
        assert_balanced(&ledger, account).await;
    }

    #[tokio::test]
    async fn create_rejects_blank_description_and_unknown_references() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;

        let err = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(1), "   ", day(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::EmptyDescription)));

        let err = ledger
            .create_transaction(NewTransaction::new(AccountId(42), Money::from_cents(1), "x", day(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::NotFound(Entity::Account, 42))));

        let err = ledger
            .create_transaction(
                NewTransaction::new(account, Money::from_cents(1), "x", day(1)).with_category(CategoryId(999)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::NotFound(Entity::Category, 999))));
        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::zero());
    }

    #[tokio::test]
    async fn dates_beyond_year_9999_are_rejected() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();

        let err = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-100), "Time travel", far))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::DateOutOfRange(_))));

        let tx = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-100), "Coffee", day(1)))
            .await
            .unwrap();
        let update = TransactionUpdate {
            date: Some(far),
            amount: Some(Money::from_cents(-900)),
            ..Default::default()
        };
        let err = ledger.update_transaction(tx.id, update).await.unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::DateOutOfRange(_))));

        let drafts = vec![
            draft(2, "Rent", -80_000),
            DraftTransaction {
                date: far,
                description: "Time travel".to_string(),
                amount: Money::from_cents(-1),
            },
        ];
        let err = ledger.import_transactions(account, &drafts).await.unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::DateOutOfRange(_))));

        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(-100));
        assert_eq!(ledger.get_transaction(tx.id).await.unwrap().date, day(1));
        assert_eq!(ledger.list_transactions(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unmatched_transaction_falls_back_to_other() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;
        let other = category_named(&ledger, OTHER_CATEGORY).await;

        let tx = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-300), "Boulangerie Paul", day(2)))
            .await
            .unwrap();
        assert_eq!(tx.category_id, Some(other));
        assert!(ledger.find_all_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_other_category_leaves_transaction_uncategorized() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;
        sqlx::query("DELETE FROM categories WHERE name = ?")
            .bind(OTHER_CATEGORY)
            .execute(ledger.pool())
            .await
            .unwrap();

        let tx = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-300), "Boulangerie", day(2)))
            .await
            .unwrap();
        assert!(tx.category_id.is_none());
        assert_balanced(&ledger, account).await;
    }

    #[tokio::test]
    async fn explicit_category_teaches_a_rule_used_next_time() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;
        let restaurants = category_named(&ledger, "Restaurants").await;

        ledger
            .create_transaction(
                NewTransaction::new(account, Money::from_cents(-450), "Starbucks Downtown", day(4))
                    .with_category(restaurants),
            )
            .await
            .unwrap();
        let rules = ledger.find_all_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].keyword, "starbucks");

        let next = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-390), "STARBUCKS AIRPORT", day(5)))
            .await
            .unwrap();
        assert_eq!(next.category_id, Some(restaurants));
    }

    #[tokio::test]
    async fn resolution_reports_how_the_category_was_chosen() {
        let ledger = ledger().await;
        let restaurants = category_named(&ledger, "Restaurants").await;
        let other = category_named(&ledger, OTHER_CATEGORY).await;
        let rule = ledger.upsert_rule("uber", restaurants).await.unwrap();
        let mut conn = ledger.pool().acquire().await.unwrap();

        let explicit = resolve_category(&mut conn, "Uber Eats", Some(other)).await.unwrap();
        assert_eq!(explicit, (Some(other), Resolution::Explicit));

        let matched = resolve_category(&mut conn, "Uber Eats", None).await.unwrap();
        assert_eq!(matched, (Some(restaurants), Resolution::Rule { rule_id: rule.id }));

        let fallback = resolve_category(&mut conn, "Boulangerie", None).await.unwrap();
        assert_eq!(fallback, (Some(other), Resolution::Fallback));

        let err = resolve_category(&mut conn, "Uber Eats", Some(CategoryId(999))).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn learning_is_idempotent() {
        let ledger = ledger().await;
        let restaurants = category_named(&ledger, "Restaurants").await;

        let first = ledger.learn("Starbucks Downtown", restaurants).await.unwrap().unwrap();
        let second = ledger.learn("Starbucks Downtown", restaurants).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(ledger.find_all_rules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn short_keywords_are_never_learned() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;
        let other = category_named(&ledger, OTHER_CATEGORY).await;

        assert!(ledger.learn("A", other).await.unwrap().is_none());
        ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-1), "A", day(1)).with_category(other))
            .await
            .unwrap();
        assert!(ledger.find_all_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn learning_failure_does_not_fail_the_write() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;
        let other = category_named(&ledger, OTHER_CATEGORY).await;
        sqlx::query("DROP TABLE category_rules")
            .execute(ledger.pool())
            .await
            .unwrap();

        let tx = ledger
            .create_transaction(
                NewTransaction::new(account, Money::from_cents(-1_000), "Pharmacie centrale", day(6))
                    .with_category(other),
            )
            .await
            .unwrap();
        assert_eq!(tx.category_id, Some(other));
        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(-1_000));
    }

    #[tokio::test]
    async fn amount_edit_moves_balance_by_the_difference() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 10_000).await;
        let tx = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-2_000), "Electricity", day(8)))
            .await
            .unwrap();

        let update = TransactionUpdate {
            amount: Some(Money::from_cents(-2_500)),
            description: Some("  EDF electricity ".to_string()),
            ..Default::default()
        };
        let updated = ledger.update_transaction(tx.id, update).await.unwrap();

        assert_eq!(updated.amount, Money::from_cents(-2_500));
        assert_eq!(updated.description, "EDF electricity");
        assert_eq!(updated.date, tx.date);
        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(7_500));
        assert_balanced(&ledger, account).await;
    }

    #[tokio::test]
    async fn recategorizing_learns_from_the_updated_description() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;
        let transport = category_named(&ledger, "Transport").await;
        let tx = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-1_500), "Uber trip", day(9)))
            .await
            .unwrap();

        let update = TransactionUpdate {
            category_id: Some(transport),
            description: Some("Navigo monthly pass".to_string()),
            ..Default::default()
        };
        let updated = ledger.update_transaction(tx.id, update).await.unwrap();
        assert_eq!(updated.category_id, Some(transport));

        let rules = ledger.find_all_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].keyword, "navigo");
        assert_eq!(rules[0].category_id, transport);

        let err = ledger
            .update_transaction(
                tx.id,
                TransactionUpdate {
                    description: Some(" ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::EmptyDescription)));
    }

    #[tokio::test]
    async fn concurrent_writes_are_not_lost() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 0).await;

        let handles: Vec<_> = (1..=20)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .create_transaction(NewTransaction::new(
                            account,
                            Money::from_cents(i * 100),
                            &format!("deposit {i}"),
                            day(1),
                        ))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(21_000));
        assert_balanced(&ledger, account).await;
    }

    // ── Import ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn import_applies_one_aggregate_delta_and_categorizes() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 10_000).await;
        let groceries = category_named(&ledger, "Groceries").await;
        ledger.upsert_rule("carrefour", groceries).await.unwrap();

        let drafts = vec![
            draft(14, "CB CARREFOUR MARKET", -4_520),
            draft(15, "VIR SALAIRE", 250_000),
            draft(16, "  ", -100),
        ];
        let summary = ledger.import_transactions(account, &drafts).await.unwrap();

        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.total, Money::from_cents(245_380));
        assert_eq!(summary.matched_by_rule, 1);
        assert_eq!(summary.fallback, 2);
        assert_eq!(summary.uncategorized, 0);
        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(255_380));

        let txs = ledger.list_transactions(DateRange::month(2024, 3)).await.unwrap();
        assert_eq!(txs.len(), 3);
        assert!(txs.iter().all(|t| t.source == TransactionSource::Bank));
        assert_eq!(txs[0].description, PLACEHOLDER_DESCRIPTION);
        assert_eq!(txs[2].category_id, Some(groceries));
        assert_balanced(&ledger, account).await;
    }

    #[tokio::test]
    async fn import_is_all_or_nothing() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 10_000).await;
        sqlx::query(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON transactions \
             WHEN NEW.description = 'POISON' BEGIN SELECT RAISE(ABORT, 'poison row'); END",
        )
        .execute(ledger.pool())
        .await
        .unwrap();

        let drafts = vec![
            draft(1, "Rent", -80_000),
            draft(2, "POISON", -1),
            draft(3, "Salary", 250_000),
        ];
        let err = ledger.import_transactions(account, &drafts).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(10_000));
        assert_eq!(ledger.list_transactions(None).await.unwrap().len(), 1);
        assert_balanced(&ledger, account).await;
    }

    #[tokio::test]
    async fn timed_out_import_rolls_back_and_frees_the_connection() {
        let ledger = ledger().await.with_import_timeout(Duration::from_micros(200));
        let account = open_account(&ledger, 0).await;
        let drafts: Vec<_> = (0..5_000)
            .map(|i| draft(1 + i % 28, "Card payment", -(i as i64 + 1)))
            .collect();

        let err = ledger.import_transactions(account, &drafts).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(t) if t == Duration::from_micros(200)));

        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::zero());
        assert!(ledger.list_transactions(None).await.unwrap().is_empty());

        let tx = ledger
            .create_transaction(NewTransaction::new(account, Money::from_cents(-250), "Coffee", day(3)))
            .await
            .unwrap();
        assert_eq!(tx.amount, Money::from_cents(-250));
        assert_balanced(&ledger, account).await;
    }

    #[tokio::test]
    async fn import_into_unknown_account_writes_nothing() {
        let ledger = ledger().await;
        let err = ledger
            .import_transactions(AccountId(7), &[draft(1, "Rent", -80_000)])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(ledger.list_transactions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_import_is_a_no_op() {
        let ledger = ledger().await;
        let account = open_account(&ledger, 500).await;
        let summary = ledger.import_transactions(account, &[]).await.unwrap();
        assert_eq!(summary, ImportSummary::default());
        assert_eq!(ledger.get_account(account).await.unwrap().balance, Money::from_cents(500));
    }

    #[tokio::test]
    async fn delete_rule_reports_missing_rules() {
        let ledger = ledger().await;
        let other = category_named(&ledger, OTHER_CATEGORY).await;
        let rule = ledger.upsert_rule("netflix", other).await.unwrap();

        ledger.delete_rule(rule.id).await.unwrap();
        assert!(ledger.find_all_rules().await.unwrap().is_empty());
        assert!(ledger.delete_rule(rule.id).await.unwrap_err().is_not_found());
        assert!(ledger.upsert_rule("netflix", CategoryId(999)).await.unwrap_err().is_not_found());
    }

    // ── Balance invariant ─────────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Create(i64),
        Delete(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (-1_000_000i64..1_000_000).prop_map(Op::Create),
            1 => any::<usize>().prop_map(Op::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn balance_tracks_sum_of_transactions(initial in -100_000i64..100_000, ops in prop::collection::vec(op(), 1..30)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let ledger = ledger().await;
                let account = open_account(&ledger, initial).await;
                let mut live: Vec<TransactionId> = Vec::new();

                for op in ops {
                    match op {
                        Op::Create(cents) => {
                            let tx = ledger
                                .create_transaction(NewTransaction::new(account, Money::from_cents(cents), "generated", day(10)))
                                .await
                                .unwrap();
                            live.push(tx.id);
                        }
                        Op::Delete(i) if !live.is_empty() => {
                            let id = live.swap_remove(i % live.len());
                            ledger.delete_transaction(id).await.unwrap();
                        }
                        Op::Delete(_) => {}
                    }
                    assert_balanced(&ledger, account).await;
                }
            });
        }
    }
}
