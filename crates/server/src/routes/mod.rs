pub mod accounts;
pub mod categories;
pub mod summary;
pub mod transactions;

pub use accounts::account_routes;
pub use categories::category_routes;
pub use summary::summary_routes;
pub use transactions::transaction_routes;
