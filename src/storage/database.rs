//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite database layer featuring:
//! - Connection pooling via r2d2
//! - Panic-safe IMMEDIATE transactions with automatic rollback
//! - Version-tracked migrations (older library databases that predate the
//!   `fine` column are upgraded in place)
//! - WAL mode for concurrent readers alongside a single writer

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, TransactionBehavior, params};

use crate::types::{LibraryError, Result, ResultExt};

/// Shared database handle.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 2;

/// Skip a migration when the column it adds is already present.
struct ColumnGuard {
    table: &'static str,
    column: &'static str,
}

/// Migration definitions
struct Migration {
    version: u32,
    description: &'static str,
    up: &'static str,
    guard: Option<ColumnGuard>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Add fine column to borrowings",
        up: "ALTER TABLE borrowings ADD COLUMN fine INTEGER NOT NULL DEFAULT 0",
        guard: Some(ColumnGuard {
            table: "borrowings",
            column: "fine",
        }),
    },
    Migration {
        version: 2,
        description: "Rewrite space-separated timestamps as RFC 3339",
        up: NORMALIZE_TIMESTAMPS,
        guard: None,
    },
];

/// Stored timestamps are compared lexically, which only orders correctly when
/// every value uses the `YYYY-MM-DDTHH:MM:SSZ` form.
const NORMALIZE_TIMESTAMPS: &str = r#"
UPDATE borrowings SET borrow_date = replace(borrow_date, ' ', 'T') || 'Z'
    WHERE borrow_date LIKE '____-__-__ __:__:__';
UPDATE borrowings SET due_date = replace(due_date, ' ', 'T') || 'Z'
    WHERE due_date LIKE '____-__-__ __:__:__';
UPDATE borrowings SET return_date = replace(return_date, ' ', 'T') || 'Z'
    WHERE return_date LIKE '____-__-__ __:__:__';
UPDATE books SET date_added = replace(date_added, ' ', 'T') || 'Z'
    WHERE date_added LIKE '____-__-__ __:__:__';
"#;

/// Connection pool configuration
///
/// Pool size is dynamically calculated based on CPU cores.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    /// Minimum pool size regardless of CPU count
    const MIN_POOL_SIZE: u32 = 2;
    /// Maximum pool size regardless of CPU count
    const MAX_POOL_SIZE: u32 = 16;

    /// Calculate pool size based on available CPU cores
    ///
    /// Formula: clamp(cores, MIN, MAX). SQLite serializes writers, so more
    /// connections than cores only helps readers.
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }

    /// Create config with automatic pool sizing based on CPU cores
    pub fn auto() -> Self {
        let max_size = Self::optimal_pool_size();
        Self {
            max_size,
            min_idle: (max_size / 4).max(1),
            connection_timeout_secs: 30,
        }
    }

    /// Create config with an explicit pool size
    pub fn with_max_size(max_size: u32) -> Self {
        Self {
            max_size,
            min_idle: (max_size / 4).max(1).min(max_size),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| {
                LibraryError::Storage(format!("Failed to create connection pool: {}", e))
            })?;

        tracing::debug!(
            "Opened database {} (pool size {})",
            path.as_ref().display(),
            config.max_size
        );

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    ///
    /// The pool holds exactly one connection, so the same in-memory database
    /// is seen by every caller. Never acquire a second connection while one
    /// is held.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| {
                LibraryError::Storage(format!("Failed to create in-memory pool: {}", e))
            })?;

        Ok(Self { pool })
    }

    /// Configure a new connection with production settings.
    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA busy_timeout = 5000;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            LibraryError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema and bring older databases up to date.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;

        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .with_context("Failed to read schema version")?;

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;

        for migration in MIGRATIONS {
            if migration.version <= current_version {
                continue;
            }

            if let Some(guard) = &migration.guard
                && Self::column_exists(&conn, guard.table, guard.column)?
            {
                tracing::debug!(
                    "Skipping migration {}: {}.{} already present",
                    migration.version,
                    guard.table,
                    guard.column
                );
                continue;
            }

            conn.execute_batch(migration.up).with_context_fn(|| {
                format!(
                    "Failed to apply migration {}: {}",
                    migration.version, migration.description
                )
            })?;

            tracing::info!(
                "Applied migration {}: {}",
                migration.version,
                migration.description
            );
        }

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to update schema version")?;
        }

        Ok(())
    }

    fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
                params![table, column],
                |row| row.get(0),
            )
            .with_context("Failed to inspect table columns")?;
        Ok(count > 0)
    }

    /// Current schema version stored in the database.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .with_context("Failed to read schema version")
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    /// Execute a single SQL statement.
    pub fn execute(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute(sql, params)?)
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// The transaction is IMMEDIATE: the write lock is taken up front, so a
    /// read-check-write sequence inside the closure cannot interleave with
    /// another writer. If the closure errors or panics the transaction is
    /// rolled back; a panic is returned as an error instead of poisoning the pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            Ok(Err(e)) => {
                // Rolled back on drop
                Err(e)
            }
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(LibraryError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }
}
