//! User and session persistence.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use super::Database;
use crate::types::{
    LibraryError, Result, Session, SessionToken, User, format_timestamp, is_unique_violation,
    timestamp_column,
};

/// Stored credentials for a user.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

pub struct AccountStore<'a> {
    db: &'a Database,
}

impl<'a> AccountStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn insert_user(&self, username: &str, password_hash: &str, is_admin: bool) -> Result<User> {
        self.db
            .execute(
                "INSERT INTO users (username, password_hash, is_admin) VALUES (?1, ?2, ?3)",
                &[&username, &password_hash, &is_admin],
            )
            .map_err(|e| match e {
                LibraryError::Database(err) if is_unique_violation(&err) => {
                    LibraryError::duplicate("User", username)
                }
                other => other,
            })?;

        tracing::info!("Registered user {} (admin={})", username, is_admin);
        Ok(User {
            username: username.to_string(),
            is_admin,
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<User>> {
        let conn = self.db.connection()?;
        Ok(conn
            .query_row(
                "SELECT username, is_admin FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        username: row.get(0)?,
                        is_admin: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn credentials(&self, username: &str) -> Result<Option<Credentials>> {
        let conn = self.db.connection()?;
        Ok(conn
            .query_row(
                "SELECT username, is_admin, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(Credentials {
                        user: User {
                            username: row.get(0)?,
                            is_admin: row.get(1)?,
                        },
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// All users ordered by username.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare("SELECT username, is_admin FROM users ORDER BY username")?;
        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    username: row.get(0)?,
                    is_admin: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn count_users(&self) -> Result<i64> {
        let conn = self.db.connection()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    pub fn count_admins(&self) -> Result<i64> {
        let conn = self.db.connection()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM users WHERE is_admin != 0",
            [],
            |row| row.get(0),
        )?)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn insert_session(&self, session: &Session) -> Result<()> {
        self.db.execute(
            "INSERT INTO sessions (token, username, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            &[
                &session.token.as_str(),
                &session.username,
                &format_timestamp(session.created_at),
                &format_timestamp(session.expires_at),
            ],
        )?;
        tracing::debug!("Stored session for {}", session.username);
        Ok(())
    }

    pub fn find_session(&self, token: &SessionToken) -> Result<Option<Session>> {
        let conn = self.db.connection()?;
        Ok(conn
            .query_row(
                "SELECT token, username, created_at, expires_at FROM sessions WHERE token = ?1",
                params![token.as_str()],
                |row| {
                    Ok(Session {
                        token: SessionToken::new(row.get::<_, String>(0)?),
                        username: row.get(1)?,
                        created_at: timestamp_column(row, 2)?,
                        expires_at: timestamp_column(row, 3)?,
                    })
                },
            )
            .optional()?)
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete_session(&self, token: &SessionToken) -> Result<bool> {
        let removed = self.db.execute(
            "DELETE FROM sessions WHERE token = ?1",
            &[&token.as_str()],
        )?;
        Ok(removed > 0)
    }

    /// Remove every session that expired at or before `now`.
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self.db.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            &[&format_timestamp(now)],
        )?;
        if removed > 0 {
            tracing::debug!("Purged {} expired sessions", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_insert_and_lookup_user() {
        let db = setup();
        let store = AccountStore::new(&db);

        store.insert_user("bob", "hash-b", false).unwrap();
        store.insert_user("alice", "hash-a", true).unwrap();

        let creds = store.credentials("alice").unwrap().unwrap();
        assert!(creds.user.is_admin);
        assert_eq!(creds.password_hash, "hash-a");
        assert!(store.get_user("carol").unwrap().is_none());

        let names: Vec<_> = store
            .list_users()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(store.count_users().unwrap(), 2);
        assert_eq!(store.count_admins().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = setup();
        let store = AccountStore::new(&db);
        store.insert_user("alice", "h", false).unwrap();
        let err = store.insert_user("alice", "h2", false).unwrap_err();
        assert!(matches!(err, LibraryError::Duplicate { entity: "User", .. }));
    }

    #[test]
    fn test_session_lifecycle() {
        let db = setup();
        let store = AccountStore::new(&db);
        store.insert_user("alice", "h", false).unwrap();

        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let session = Session {
            token: SessionToken::generate(),
            username: "alice".into(),
            created_at: created,
            expires_at: created + Duration::hours(12),
        };
        store.insert_session(&session).unwrap();
        assert_eq!(store.find_session(&session.token).unwrap(), Some(session.clone()));

        assert_eq!(
            store
                .purge_expired_sessions(created + Duration::hours(1))
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .purge_expired_sessions(created + Duration::hours(12))
                .unwrap(),
            1
        );
        assert!(store.find_session(&session.token).unwrap().is_none());
        assert!(!store.delete_session(&session.token).unwrap());
    }
}
