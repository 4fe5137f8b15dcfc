//! Accounts and login sessions.

use std::sync::Arc;

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::password::{hash_password, reject_unknown_user, verify_password};
use crate::circulation::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::storage::{AccountStore, SharedDatabase};
use crate::types::{
    LibraryError, Result, Session, SessionToken, User, ValidationError, ValidationErrorKind,
};

pub struct AuthService {
    db: SharedDatabase,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(db: SharedDatabase, config: AuthConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: SharedDatabase, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self { db, config, clock }
    }

    /// Create an account.
    ///
    /// Admin accounts may only be created by an admin, except for the very
    /// first one.
    pub fn register(
        &self,
        username: &str,
        password: &SecretString,
        is_admin: bool,
        caller: Option<&User>,
    ) -> Result<User> {
        let username = username.trim();
        self.validate(username, password)?;

        let accounts = AccountStore::new(&self.db);
        if is_admin && !caller.is_some_and(|c| c.is_admin) && accounts.count_admins()? > 0 {
            return Err(LibraryError::PermissionDenied(
                "only an admin can create another admin".into(),
            ));
        }
        if accounts.get_user(username)?.is_some() {
            return Err(LibraryError::duplicate("User", username));
        }

        let hash = hash_password(password)?;
        accounts.insert_user(username, &hash, is_admin)
    }

    /// Verify credentials and open a session.
    pub fn login(&self, username: &str, password: &SecretString) -> Result<Session> {
        let now = self.clock.now();
        let accounts = AccountStore::new(&self.db);
        accounts.purge_expired_sessions(now)?;

        let Some(creds) = accounts.credentials(username.trim())? else {
            debug!("Login for unknown user {}", username.trim());
            return Err(reject_unknown_user(password));
        };
        verify_password(password, &creds.password_hash)?;

        let session = Session {
            token: SessionToken::generate(),
            username: creds.user.username,
            created_at: now,
            expires_at: now + Duration::hours(self.config.session_ttl_hours),
        };
        accounts.insert_session(&session)?;
        info!("{} logged in", session.username);
        Ok(session)
    }

    /// End a session. Returns whether it was still active.
    pub fn logout(&self, token: &SessionToken) -> Result<bool> {
        AccountStore::new(&self.db).delete_session(token)
    }

    /// Resolve a session token to its user.
    pub fn current_user(&self, token: &SessionToken) -> Result<User> {
        let accounts = AccountStore::new(&self.db);
        let session = accounts
            .find_session(token)?
            .ok_or(LibraryError::NotLoggedIn)?;

        if session.is_expired(self.clock.now()) {
            accounts.delete_session(token)?;
            return Err(LibraryError::SessionExpired);
        }

        accounts
            .get_user(&session.username)?
            .ok_or(LibraryError::NotLoggedIn)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        AccountStore::new(&self.db).list_users()
    }

    fn validate(&self, username: &str, password: &SecretString) -> Result<()> {
        let name_len = username.chars().count();
        if name_len < self.config.min_username_len {
            return Err(ValidationError::new(
                ValidationErrorKind::Range,
                format!(
                    "Username must be at least {} characters",
                    self.config.min_username_len
                ),
            )
            .with_field("username")
            .with_comparison(
                format!(">= {}", self.config.min_username_len),
                name_len.to_string(),
            )
            .into());
        }

        let password_len = password.expose_secret().chars().count();
        if password_len < self.config.min_password_len {
            return Err(ValidationError::new(
                ValidationErrorKind::Range,
                format!(
                    "Password must be at least {} characters",
                    self.config.min_password_len
                ),
            )
            .with_field("password")
            .into());
        }
        Ok(())
    }
}

/// Fail unless `user` is an admin.
pub fn require_admin(user: &User) -> Result<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(LibraryError::PermissionDenied(format!(
            "{} is not an admin",
            user.username
        )))
    }
}
