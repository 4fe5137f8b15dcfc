//! libris - Library Management
//!
//! A small-library circulation system: catalog maintenance, borrowing and
//! returns with overdue fines, member accounts, and book recommendations
//! mined from borrowing history.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use libris::{Circulation, Database, LoanPolicy};
//!
//! let db = Arc::new(Database::open(".libris/library.db")?);
//! db.initialize()?;
//! let desk = Circulation::new(db.clone(), LoanPolicy::default());
//! let loan = desk.borrow(42, "alice")?;
//! let receipt = desk.return_book(loan.id)?;
//! ```
//!
//! ## Modules
//!
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`circulation`]: Borrow/return transactions and the fine policy
//! - [`recommend`]: Truncated-SVD collaborative filtering
//! - [`auth`]: Argon2 password hashing and login sessions
//! - [`config`]: Layered configuration

pub mod auth;
pub mod circulation;
pub mod cli;
pub mod config;
pub mod constants;
pub mod recommend;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{LibraryError, Result, ResultExt, ValidationError};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{AccountStore, CatalogStore, Database, LoanStore, SharedDatabase};

// Services
pub use auth::AuthService;
pub use circulation::{Circulation, Clock, LoanPolicy, ManualClock, SystemClock};
pub use recommend::Recommender;

// Domain
pub use types::{
    Book, FinesReport, Loan, LoanView, NewBook, Recommendation, RecommendationSource,
    ReturnReceipt, Session, SessionToken, User,
};
