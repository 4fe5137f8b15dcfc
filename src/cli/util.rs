//! CLI Common Utilities
//!
//! Workspace discovery, database opening and the persisted login session
//! shared by all command handlers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{AuthService, require_admin};
use crate::circulation::{Circulation, LoanPolicy};
use crate::config::{Config, ConfigLoader, DatabaseConfig};
use crate::constants::paths;
use crate::recommend::Recommender;
use crate::storage::{Database, PoolConfig, SharedDatabase};
use crate::types::{LibraryError, Result, SessionToken, User};

/// Command execution context
///
/// Provides unified access to the resources CLI commands need: the opened
/// library database, the merged configuration and the workspace paths.
#[derive(Clone)]
pub struct CommandContext {
    /// Workspace root (directory containing `.libris`)
    pub root: PathBuf,
    /// `.libris` directory
    pub libris_dir: PathBuf,
    /// Shared database handle
    pub db: SharedDatabase,
    /// Loaded configuration
    pub config: Config,
}

impl CommandContext {
    /// Load the context for the workspace in the current directory.
    pub fn load() -> Result<Self> {
        let root = std::env::current_dir()?;
        Self::load_at(&root)
    }

    /// Validates initialization, loads config and opens (and migrates) the
    /// database.
    pub fn load_at(root: &Path) -> Result<Self> {
        let libris_dir = require_initialized(root)?;
        let config = ConfigLoader::load_from(root)?;

        let db_path = database_path(&libris_dir, &config.database);
        if !db_path.exists() {
            return Err(LibraryError::NotInitialized);
        }
        let db = open_database(&db_path, &config.database)?;
        db.initialize()?;

        Ok(Self {
            root: root.to_path_buf(),
            libris_dir,
            db: Arc::new(db),
            config,
        })
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.db.clone(), self.config.auth.clone())
    }

    pub fn circulation(&self) -> Circulation {
        Circulation::new(self.db.clone(), LoanPolicy::from(&self.config.loans))
    }

    pub fn recommender(&self) -> Recommender {
        Recommender::new(self.db.clone(), &self.config.recommend)
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn session_path(&self) -> PathBuf {
        self.libris_dir.join(paths::SESSION_FILE)
    }

    /// Token saved by the last `user login`, if any.
    pub fn read_session(&self) -> Result<Option<SessionToken>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let token = fs::read_to_string(&path)?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| SessionToken::new(token)))
    }

    pub fn save_session(&self, token: &SessionToken) -> Result<()> {
        fs::write(self.session_path(), token.as_str())?;
        tracing::debug!("Saved session to {}", self.session_path().display());
        Ok(())
    }

    pub fn clear_session(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// The logged-in user. A stale session file is removed.
    pub fn current_user(&self) -> Result<User> {
        let token = self.read_session()?.ok_or(LibraryError::NotLoggedIn)?;
        match self.auth().current_user(&token) {
            Err(e @ (LibraryError::SessionExpired | LibraryError::NotLoggedIn)) => {
                self.clear_session()?;
                Err(e)
            }
            other => other,
        }
    }

    pub fn require_admin(&self) -> Result<User> {
        let user = self.current_user()?;
        require_admin(&user)?;
        Ok(user)
    }
}

/// Require a libris workspace under `root`.
///
/// Returns the `.libris` directory path, or `LibraryError::NotInitialized`.
pub fn require_initialized(root: &Path) -> Result<PathBuf> {
    let libris_dir = root.join(paths::LIBRIS_DIR);
    if !libris_dir.exists() {
        return Err(LibraryError::NotInitialized);
    }
    Ok(libris_dir)
}

pub fn is_initialized(root: &Path) -> bool {
    root.join(paths::LIBRIS_DIR).exists()
}

/// Database file location: `database.path` if absolute, else relative to `.libris`.
pub fn database_path(libris_dir: &Path, config: &DatabaseConfig) -> PathBuf {
    let path = Path::new(&config.path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        libris_dir.join(path)
    }
}

pub fn open_database(path: &Path, config: &DatabaseConfig) -> Result<Database> {
    let pool = config
        .pool_max_size
        .map(PoolConfig::with_max_size)
        .unwrap_or_else(PoolConfig::auto);
    Database::open_with_config(path, pool)
}

/// Create and initialize the library database.
pub fn create_database(libris_dir: &Path, config: &DatabaseConfig) -> Result<Database> {
    let db_path = database_path(libris_dir, config);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let db = open_database(&db_path, config)?;
    db.initialize()?;
    Ok(db)
}
