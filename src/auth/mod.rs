//! Accounts, password hashing and login sessions.

mod password;
mod service;

pub use password::{hash_password, verify_password};
pub use service::{AuthService, require_admin};
