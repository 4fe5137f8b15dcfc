pub mod accounts;
pub mod catalog;
pub mod database;
pub mod loans;

pub use accounts::{AccountStore, Credentials};
pub use catalog::{CatalogStats, CatalogStore, ImportSummary};
pub use database::{Database, PoolConfig, SharedDatabase};
pub use loans::{BorrowCount, LoanStats, LoanStore};
