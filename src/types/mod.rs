pub mod book;
pub mod error;
pub mod loan;
pub mod user;
pub mod utils;

pub use book::{Book, NewBook};
pub use error::{
    LibraryError, Result, ResultExt, ValidationError, ValidationErrorKind, is_unique_violation,
};
pub use loan::{
    FinesReport, Loan, LoanView, Recommendation, RecommendationSource, ReturnReceipt,
};
pub use user::{Session, User};
pub use utils::{
    display_timestamp, format_timestamp, log_filter_warn,
    optional_timestamp_column, parse_timestamp, timestamp_column,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type-safe wrapper for session tokens
///
/// Prevents accidental mixing of tokens with usernames or other strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_tokens_are_unique() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
