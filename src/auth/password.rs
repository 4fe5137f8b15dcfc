//! Password hashing (Argon2id, PHC string format).

use std::sync::OnceLock;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};

use crate::types::{LibraryError, Result};

/// Hash a password for storage.
pub fn hash_password(password: &SecretString) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LibraryError::Storage(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash.
///
/// Hashes that are not Argon2 PHC strings (e.g. bcrypt rows from an older
/// database) never verify; the user has to be re-registered.
pub fn verify_password(password: &SecretString, stored: &str) -> Result<()> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        tracing::warn!("Unreadable password hash ({}); rejecting login", e);
        LibraryError::InvalidCredentials
    })?;

    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed)
        .map_err(|_| LibraryError::InvalidCredentials)
}

/// Hash checked for logins naming an unknown user, so a missing account costs
/// the same Argon2 work as a wrong password.
static UNKNOWN_USER_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Spend one verification on a throwaway hash, then reject.
pub(crate) fn reject_unknown_user(password: &SecretString) -> LibraryError {
    let hash = UNKNOWN_USER_HASH.get_or_init(|| {
        hash_password(&SecretString::from("libris-unknown-user".to_string())).ok()
    });
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
    LibraryError::InvalidCredentials
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password(&secret("open sesame")).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&secret("open sesame"), &hash).is_ok());
    }

    #[test]
    fn test_wrong_password() {
        let hash = hash_password(&secret("open sesame")).unwrap();
        assert!(matches!(
            verify_password(&secret("open barley"), &hash),
            Err(LibraryError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password(&secret("same")).unwrap();
        let b = hash_password(&secret("same")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_user_runs_a_real_verification() {
        let err = reject_unknown_user(&secret("libris-unknown-user"));
        assert!(matches!(err, LibraryError::InvalidCredentials));

        let hash = UNKNOWN_USER_HASH.get().cloned().flatten().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordHash::new(&hash).is_ok());
    }

    #[test]
    fn test_legacy_bcrypt_hash_rejected() {
        let bcrypt = "$2b$12$KIXQJ5h5yqvVZ0v6B9pQeO6Z3Lq1m1lB8pQ0w2gk9rjH3o3Yk7S5a";
        assert!(matches!(
            verify_password(&secret("anything"), bcrypt),
            Err(LibraryError::InvalidCredentials)
        ));
    }
}
