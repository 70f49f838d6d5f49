use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use ucaep_auth::{Account, AccountStatus, ProfileUpdate, Role, normalize_email};
use ucaep_core::AccountId;

use super::{AccountRecord, CredentialStore, RoleChange, StoreError};

/// In-memory credential store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<AccountId, AccountRecord>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("credential store lock poisoned".to_string())
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify(
        &self,
        id: AccountId,
        f: impl FnOnce(&mut Account),
    ) -> Result<Account, StoreError> {
        let mut map = self.accounts.write().map_err(poisoned)?;
        let record = map.get_mut(&id).ok_or(StoreError::NotFound)?;
        f(&mut record.account);
        Ok(record.account.clone())
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(
        &self,
        mut account: Account,
        password_hash: String,
    ) -> Result<Account, StoreError> {
        account.email = normalize_email(&account.email);
        let mut map = self.accounts.write().map_err(poisoned)?;
        if map.values().any(|r| r.account.email == account.email) {
            return Err(StoreError::Duplicate);
        }
        map.insert(
            account.id,
            AccountRecord {
                account: account.clone(),
                password_hash,
            },
        );
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError> {
        let email = normalize_email(email);
        let map = self.accounts.read().map_err(poisoned)?;
        Ok(map.values().find(|r| r.account.email == email).cloned())
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let map = self.accounts.read().map_err(poisoned)?;
        Ok(map.get(&id).map(|r| r.account.clone()))
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let map = self.accounts.read().map_err(poisoned)?;
        let mut out: Vec<Account> = map.values().map(|r| r.account.clone()).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn update_role(
        &self,
        id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<RoleChange, StoreError> {
        let mut previous = role;
        let account = self.modify(id, |a| {
            previous = a.role;
            a.role = role;
            a.updated_at = now;
        })?;
        Ok(RoleChange { previous, account })
    }

    async fn update_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        self.modify(id, |a| {
            a.status = status;
            a.updated_at = now;
        })
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        self.modify(id, |a| update.apply_to(a, now))
    }

    async fn delete(&self, id: AccountId) -> Result<(), StoreError> {
        let mut map = self.accounts.write().map_err(poisoned)?;
        map.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}
