//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/libris/) and project (.libris/) level configuration.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::types::{LibraryError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Library identity
    pub library: LibraryConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Loan period and fine policy
    pub loans: LoanConfig,

    /// Recommendation settings
    pub recommend: RecommendConfig,

    /// Account and session settings
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            library: LibraryConfig::default(),
            database: DatabaseConfig::default(),
            loans: LoanConfig::default(),
            recommend: RecommendConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LibraryError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.loans.loan_period_days <= 0 {
            return Err(LibraryError::Config(format!(
                "loans.loan_period_days must be greater than 0, got {}",
                self.loans.loan_period_days
            )));
        }

        if self.loans.grace_period_days < 0 {
            return Err(LibraryError::Config(format!(
                "loans.grace_period_days must not be negative, got {}",
                self.loans.grace_period_days
            )));
        }

        if self.loans.fine_per_day < 0 {
            return Err(LibraryError::Config(format!(
                "loans.fine_per_day must not be negative, got {}",
                self.loans.fine_per_day
            )));
        }

        if self.recommend.max_rank == 0 {
            return Err(LibraryError::Config(
                "recommend.max_rank must be greater than 0".to_string(),
            ));
        }

        if self.auth.session_ttl_hours <= 0 {
            return Err(LibraryError::Config(
                "auth.session_ttl_hours must be greater than 0".to_string(),
            ));
        }

        if self.database.pool_max_size == Some(0) {
            return Err(LibraryError::Config(
                "database.pool_max_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Library Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LibraryConfig {
    /// Display name used in status output
    pub name: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: "Library".to_string(),
        }
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file, relative to the `.libris` directory unless absolute
    pub path: String,

    /// Pool size override (defaults to CPU-based sizing)
    pub pool_max_size: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: constants::paths::DATABASE_FILE.to_string(),
            pool_max_size: None,
        }
    }
}

// =============================================================================
// Loan Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoanConfig {
    /// Days until a new loan is due
    pub loan_period_days: i64,

    /// Days past due before fines accrue
    pub grace_period_days: i64,

    /// Fine per day beyond the grace period
    pub fine_per_day: i64,

    /// Currency label for display
    pub currency: String,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            loan_period_days: constants::loans::LOAN_PERIOD_DAYS,
            grace_period_days: constants::loans::GRACE_PERIOD_DAYS,
            fine_per_day: constants::loans::FINE_PER_DAY,
            currency: constants::loans::CURRENCY.to_string(),
        }
    }
}

// =============================================================================
// Recommendation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecommendConfig {
    /// Upper bound on the SVD rank
    pub max_rank: usize,

    /// Default number of recommendations
    pub default_limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            max_rank: constants::recommend::MAX_RANK,
            default_limit: constants::recommend::DEFAULT_LIMIT,
        }
    }
}

// =============================================================================
// Auth Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub min_username_len: usize,
    pub min_password_len: usize,
    /// Hours a login stays valid
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_username_len: constants::auth::MIN_USERNAME_LEN,
            min_password_len: constants::auth::MIN_PASSWORD_LEN,
            session_ttl_hours: constants::auth::SESSION_TTL_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.loans.loan_period_days, 14);
        assert_eq!(config.loans.grace_period_days, 14);
        assert_eq!(config.loans.fine_per_day, 10);
        assert_eq!(config.recommend.max_rank, 50);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.loans.loan_period_days = 0;
        assert!(matches!(config.validate(), Err(LibraryError::Config(_))));

        let mut config = Config::default();
        config.loans.fine_per_day = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.recommend.max_rank = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.pool_max_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [loans]
            fine_per_day = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.loans.fine_per_day, 25);
        assert_eq!(config.loans.loan_period_days, 14);
        assert_eq!(config.auth, AuthConfig::default());
    }
}
