//! Global Constants
//!
//! Centralized constants for configuration defaults and tuning.
//! All magic numbers should be defined here with documentation.

/// Circulation constants
pub mod loans {
    /// Days a book may be kept before it is due
    pub const LOAN_PERIOD_DAYS: i64 = 14;

    /// Days past the due date before fines start accruing
    pub const GRACE_PERIOD_DAYS: i64 = 14;

    /// Fine charged per day beyond the grace period
    pub const FINE_PER_DAY: i64 = 10;

    /// Currency label used when rendering fines
    pub const CURRENCY: &str = "Rs.";
}

/// Recommendation constants
pub mod recommend {
    /// Upper bound on the factorization rank
    pub const MAX_RANK: usize = 50;

    /// Recommendations returned when no limit is given
    pub const DEFAULT_LIMIT: usize = 5;

    /// Maximum Jacobi sweeps before the SVD gives up converging
    pub const MAX_SWEEPS: usize = 60;

    /// Relative orthogonality tolerance for a column pair
    pub const TOLERANCE: f64 = 1e-12;
}

/// Account constants
pub mod auth {
    /// Minimum username length after trimming
    pub const MIN_USERNAME_LEN: usize = 3;

    /// Minimum password length
    pub const MIN_PASSWORD_LEN: usize = 6;

    /// Session lifetime
    pub const SESSION_TTL_HOURS: i64 = 12;
}

/// Workspace layout
pub mod paths {
    /// Workspace directory name
    pub const LIBRIS_DIR: &str = ".libris";

    /// Database file relative to the workspace
    pub const DATABASE_FILE: &str = "library.db";

    /// Config file relative to the workspace
    pub const CONFIG_FILE: &str = "config.toml";

    /// Current session token file relative to the workspace
    pub const SESSION_FILE: &str = "session";
}
