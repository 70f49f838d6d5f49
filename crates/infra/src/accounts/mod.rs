//! Credential store: account records plus their password hashes.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;
pub(crate) use postgres::is_transient;

use chrono::{DateTime, Utc};
use thiserror::Error;

use ucaep_auth::{Account, AccountStatus, AuthError, ProfileUpdate, Role};
use ucaep_core::AccountId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("an account with this email already exists")]
    Duplicate,

    #[error("account not found")]
    NotFound,

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AuthError::DuplicateEmail,
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Corrupt(msg) | StoreError::Unavailable(msg) => {
                AuthError::DatabaseUnavailable(msg)
            }
        }
    }
}

/// Account plus its password hash. Only login reads this shape.
#[derive(Clone)]
pub struct AccountRecord {
    pub account: Account,
    pub password_hash: String,
}

impl std::fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRecord")
            .field("account", &self.account)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Outcome of a role change: the role before the write and the updated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChange {
    pub previous: Role,
    pub account: Account,
}

/// Persistence for accounts.
///
/// Emails are stored normalized (trimmed, lowercase) and are unique
/// case-insensitively. Default reads never return the password hash.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new account. Fails with `Duplicate` if the email is taken.
    async fn insert(&self, account: Account, password_hash: String) -> Result<Account, StoreError>;

    /// Look up by email, including the hash.
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError>;

    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// All accounts, oldest first.
    async fn list(&self) -> Result<Vec<Account>, StoreError>;

    /// Read-modify-write of the role as a single atomic unit.
    async fn update_role(
        &self,
        id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<RoleChange, StoreError>;

    async fn update_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError>;

    async fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError>;

    async fn delete(&self, id: AccountId) -> Result<(), StoreError>;
}
