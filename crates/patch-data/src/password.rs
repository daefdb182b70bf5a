//! Password hashing and verification using Argon2.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use password_hash::rand_core::OsRng;
use tracing::error;

use crate::users::{Result, UserError};

/// Hashes a password using Argon2id.
///
/// Returns a PHC string that carries the salt and parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| UserError::PasswordHash)?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC string.
///
/// An unparseable hash never verifies.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on tokio's blocking pool.
pub(crate) async fn hash_off_runtime(password: &str) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!(error = %e, "password hashing task failed");
            UserError::PasswordHash
        })?
}

/// [`verify_password`] on tokio's blocking pool. A failed task never
/// verifies.
pub(crate) async fn verify_off_runtime(password: &str, hash: &str) -> bool {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "password verification task failed");
            false
        })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("correct horse ", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_salted_hashes_differ() {
        let first = hash_password("secret").unwrap();
        let second = hash_password("secret").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("secret", &first));
        assert!(verify_password("secret", &second));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("secret", "secret"));
        assert!(!verify_password("secret", ""));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_runtime_free() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        // On a single-threaded runtime the task above only runs if hashing
        // yields instead of holding the thread.
        let hash = hash_off_runtime("secret").await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
        assert!(verify_off_runtime("secret", &hash).await);
        assert!(!verify_off_runtime("other", &hash).await);
    }
}
