pub mod account;
pub mod category;
pub mod error;
pub mod money;
pub mod period;
pub mod summary;
pub mod transaction;

pub use account::{
    Account, AccountId, AccountOrder, AccountType, AccountUpdate, AccountWithTransactions,
    BalanceAudit, NewAccount, SortDirection, DEFAULT_CURRENCY, INITIAL_BALANCE_DESCRIPTION,
};
pub use category::{
    Category, CategoryId, CategoryKind, CategoryRule, RuleId, DEFAULT_CATEGORIES, OTHER_CATEGORY,
};
pub use error::{Entity, LedgerError};
pub use money::Money;
pub use period::DateRange;
pub use transaction::{
    ensure_storable_date, DraftTransaction, NewTransaction, Transaction, TransactionId, TransactionSource,
    TransactionUpdate,
};
