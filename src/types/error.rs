//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Every fallible operation returns [`LibraryError`]; the CLI renders the
//! message, the library never shows dialogs or prints.
//!
//! ## Error Kinds
//!
//! - **Domain**: expected business outcomes (book unavailable, already returned)
//! - **Access**: authentication and authorization failures
//! - **Input**: structured validation failures with field context
//! - **System**: IO, SQLite, JSON, configuration

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Structured validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// What validation failed
    pub kind: ValidationErrorKind,
    /// Field that failed validation
    pub field: Option<String>,
    /// Detailed message
    pub message: String,
    /// Expected value or format
    pub expected: Option<String>,
    /// Actual value received
    pub actual: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "Invalid {}: {}", field, self.message)?;
        } else {
            write!(f, "Invalid input: {}", self.message)?;
        }
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected {}, got {})", expected, actual)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add expected/actual values
    pub fn with_comparison(
        mut self,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Shorthand for a required field that was left empty
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(ValidationErrorKind::MissingField, "field is required").with_field(field)
    }
}

/// Validation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required field missing
    MissingField,
    /// Invalid format
    Format,
    /// Value out of range
    Range,
    /// Consistency check failed
    Consistency,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LibraryError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'libris init' first")]
    NotInitialized,

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Book is not available for borrowing")]
    BookUnavailable { book_id: i64 },

    #[error("Book already returned")]
    AlreadyReturned { borrowing_id: i64 },

    #[error("Borrowing {borrowing_id} is overdue and carries a fine of {fine}")]
    UnconfirmedFine { borrowing_id: i64, fine: i64 },

    #[error("Book {book_id} still has {active} active loan(s)")]
    ActiveLoans { book_id: i64, active: i64 },

    #[error("{0}")]
    Validation(ValidationError),

    // -------------------------------------------------------------------------
    // Access Errors
    // -------------------------------------------------------------------------
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not logged in: run 'libris user login' first")]
    NotLoggedIn,

    #[error("Session expired: log in again")]
    SessionExpired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl From<ValidationError> for LibraryError {
    fn from(err: ValidationError) -> Self {
        LibraryError::Validation(err)
    }
}

impl From<r2d2::Error> for LibraryError {
    fn from(err: r2d2::Error) -> Self {
        LibraryError::Storage(format!("Connection pool error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl LibraryError {
    /// Create a not-found error for the given entity and key
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Create a duplicate error for the given entity and key
    pub fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        Self::Duplicate {
            entity,
            key: key.to_string(),
        }
    }

    /// Whether this error is an expected business outcome rather than a fault.
    ///
    /// The CLI logs faults at error level and domain outcomes at info level.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Duplicate { .. }
                | Self::BookUnavailable { .. }
                | Self::AlreadyReturned { .. }
                | Self::UnconfirmedFine { .. }
                | Self::ActiveLoans { .. }
                | Self::Validation(_)
                | Self::InvalidCredentials
                | Self::NotLoggedIn
                | Self::SessionExpired
                | Self::PermissionDenied(_)
        )
    }
}

/// True when a SQLite error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| LibraryError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| LibraryError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_messages_match_user_facing_text() {
        assert_eq!(
            LibraryError::BookUnavailable { book_id: 3 }.to_string(),
            "Book is not available for borrowing"
        );
        assert_eq!(
            LibraryError::AlreadyReturned { borrowing_id: 9 }.to_string(),
            "Book already returned"
        );
        assert_eq!(
            LibraryError::not_found("Borrowing record", 42).to_string(),
            "Borrowing record not found: 42"
        );
    }

    #[test]
    fn test_is_domain() {
        assert!(LibraryError::InvalidCredentials.is_domain());
        assert!(LibraryError::duplicate("Book", "978").is_domain());
        assert!(LibraryError::UnconfirmedFine { borrowing_id: 1, fine: 10 }.is_domain());
        assert!(!LibraryError::Storage("disk".into()).is_domain());
        assert!(!LibraryError::NotInitialized.is_domain());
    }

    #[test]
    fn test_validation_display() {
        let err = ValidationError::new(ValidationErrorKind::Range, "too short")
            .with_field("password")
            .with_comparison(">= 6 characters", "4");
        assert_eq!(
            err.to_string(),
            "Invalid password: too short (expected >= 6 characters, got 4)"
        );

        let missing = ValidationError::missing("isbn");
        assert_eq!(missing.kind, ValidationErrorKind::MissingField);
        assert_eq!(missing.to_string(), "Invalid isbn: field is required");
    }

    #[test]
    fn test_with_context() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = io.with_context("Failed to read catalog").unwrap_err();
        assert_eq!(err.to_string(), "Storage error: Failed to read catalog: boom");
    }

    #[test]
    fn test_unique_violation_detection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
