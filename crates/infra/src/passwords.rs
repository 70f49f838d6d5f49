//! bcrypt password hashing off the async executor.

use std::sync::{Arc, OnceLock};

use tokio::task;
use tracing::warn;

use ucaep_auth::AuthError;

const DUMMY_PASSWORD: &str = "ucaep-timing-equaliser";

/// Hashes and verifies passwords on the blocking thread pool.
///
/// Plaintext and hashes are never logged.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Arc<OnceLock<String>>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").field("cost", &self.cost).finish()
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub async fn hash(&self, password: String) -> Result<String, AuthError> {
        let cost = self.cost;
        task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::ServerConfiguration(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::ServerConfiguration(format!("password hashing failed: {e}")))
    }

    /// Compare `password` against `hash`.
    ///
    /// With no stored hash the password is checked against a throwaway hash
    /// of the same cost and the result is always `false`, so unknown accounts
    /// cost the same as wrong passwords.
    pub async fn verify(&self, password: String, hash: Option<String>) -> bool {
        let known = hash.is_some();
        let dummy = self.dummy_hash.clone();
        let cost = self.cost;

        let outcome = task::spawn_blocking(move || {
            let hash = match hash {
                Some(h) => h,
                None => dummy
                    .get_or_init(|| bcrypt::hash(DUMMY_PASSWORD, cost).unwrap_or_default())
                    .clone(),
            };
            bcrypt::verify(password, &hash)
        })
        .await;

        match outcome {
            Ok(Ok(matched)) => known && matched,
            Ok(Err(e)) => {
                warn!(error = %e, "stored password hash could not be parsed");
                false
            }
            Err(e) => {
                warn!(error = %e, "password verification task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let h = hasher();
        let hash = h.hash("password1".into()).await.unwrap();
        assert_ne!(hash, "password1");
        assert!(hash.starts_with("$2"));
        assert!(h.verify("password1".into(), Some(hash.clone())).await);
        assert!(!h.verify("password2".into(), Some(hash)).await);
    }

    #[tokio::test]
    async fn missing_hash_never_matches() {
        let h = hasher();
        assert!(!h.verify(DUMMY_PASSWORD.into(), None).await);
        assert!(!h.verify("anything".into(), None).await);
    }

    #[tokio::test]
    async fn corrupt_hash_is_a_mismatch() {
        assert!(!hasher().verify("pw".into(), Some("not-a-bcrypt-hash".into())).await);
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let h = hasher();
        let a = h.hash("same".into()).await.unwrap();
        let b = h.hash("same".into()).await.unwrap();
        assert_ne!(a, b);
    }
}
