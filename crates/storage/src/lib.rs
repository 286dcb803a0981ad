pub mod db;
pub mod error;
pub mod ledger;
pub mod queries;

pub use db::{create_db, create_in_memory_db, seed_default_categories, DbPool};
pub use error::StoreError;
pub use ledger::{AccountQuery, ImportSummary, Ledger, DEFAULT_IMPORT_TIMEOUT};
