//! Postgres-backed credential store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | PoolTimedOut / Io / PoolClosed | n/a | `Unavailable` (after retries) |
//! | anything else | n/a | `Unavailable` |
//!
//! Emails are unique through an index on `lower(email)`, so near-duplicates
//! inserted by any path are still caught by the database.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use ucaep_auth::{Account, AccountStatus, ProfileUpdate, Role, normalize_email};
use ucaep_core::AccountId;

use super::{AccountRecord, CredentialStore, RoleChange, StoreError};
use crate::retry::RetryPolicy;

const ACCOUNT_COLUMNS: &str =
    "id, email, first_name, last_name, phone, role, status, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
    retry: RetryPolicy,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create the `accounts` table and its case-insensitive email index.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id            UUID PRIMARY KEY,
                email         TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                first_name    TEXT NOT NULL,
                last_name     TEXT NOT NULL,
                phone         TEXT NULL,
                role          TEXT NOT NULL,
                status        TEXT NOT NULL,
                created_at    TIMESTAMPTZ NOT NULL,
                updated_at    TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_accounts", e))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_lower_idx \
             ON accounts (lower(email))",
        )
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_accounts_email_idx", e))?;
        Ok(())
    }

    async fn fetch_optional(
        &self,
        operation: &'static str,
        sql: &str,
        id: AccountId,
    ) -> Result<Option<PgRow>, StoreError> {
        let pool = self.pool.clone();
        self.retry
            .run(operation, is_transient, || {
                let pool = pool.clone();
                async move {
                    sqlx::query(sql)
                        .bind(id.as_uuid())
                        .fetch_optional(&*pool)
                        .await
                }
            })
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait::async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self, account, password_hash), fields(account_id = %account.id), err)]
    async fn insert(&self, account: Account, password_hash: String) -> Result<Account, StoreError> {
        let email = normalize_email(&account.email);
        let pool = self.pool.clone();
        let sql = format!(
            "INSERT INTO accounts \
             (id, email, password_hash, first_name, last_name, phone, role, status, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = self
            .retry
            .run("insert_account", is_transient, || {
                let pool = pool.clone();
                let (sql, email, hash, account) = (&sql, &email, &password_hash, &account);
                async move {
                    sqlx::query(sql)
                        .bind(account.id.as_uuid())
                        .bind(email)
                        .bind(hash)
                        .bind(&account.first_name)
                        .bind(&account.last_name)
                        .bind(&account.phone)
                        .bind(account.role.as_str())
                        .bind(account.status.as_str())
                        .bind(account.created_at)
                        .bind(account.updated_at)
                        .fetch_one(&*pool)
                        .await
                }
            })
            .await
            .map_err(|e| map_sqlx_error("insert_account", e))?;
        account_from_row(&row)
    }

    #[instrument(skip(self, email), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError> {
        let email = normalize_email(email);
        let pool = self.pool.clone();
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS}, password_hash FROM accounts WHERE lower(email) = $1"
        );
        let row = self
            .retry
            .run("find_by_email", is_transient, || {
                let pool = pool.clone();
                let (sql, email) = (&sql, &email);
                async move { sqlx::query(sql).bind(email).fetch_optional(&*pool).await }
            })
            .await
            .map_err(|e| map_sqlx_error("find_by_email", e))?;

        row.map(|row| {
            let password_hash: String = row
                .try_get("password_hash")
                .map_err(|e| StoreError::Corrupt(format!("password_hash: {e}")))?;
            Ok(AccountRecord {
                account: account_from_row(&row)?,
                password_hash,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        self.fetch_optional("get_account", &sql, id)
            .await?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let pool = self.pool.clone();
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at ASC, id ASC");
        let rows = self
            .retry
            .run("list_accounts", is_transient, || {
                let pool = pool.clone();
                let sql = &sql;
                async move { sqlx::query(sql).fetch_all(&*pool).await }
            })
            .await
            .map_err(|e| map_sqlx_error("list_accounts", e))?;
        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self), fields(account_id = %id, role = %role), err)]
    async fn update_role(
        &self,
        id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<RoleChange, StoreError> {
        let pool = self.pool.clone();
        let update_sql = format!(
            "UPDATE accounts SET role = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        let result = self
            .retry
            .run("update_role", is_transient, || {
                let pool = pool.clone();
                let update_sql = &update_sql;
                async move {
                    let mut tx = pool.begin().await?;
                    let current = sqlx::query("SELECT role FROM accounts WHERE id = $1 FOR UPDATE")
                        .bind(id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;
                    let Some(current) = current else {
                        tx.rollback().await?;
                        return Ok(None);
                    };
                    let previous: String = current.try_get("role")?;
                    let row = sqlx::query(update_sql)
                        .bind(id.as_uuid())
                        .bind(role.as_str())
                        .bind(now)
                        .fetch_one(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    Ok::<_, sqlx::Error>(Some((previous, row)))
                }
            })
            .await
            .map_err(|e| map_sqlx_error("update_role", e))?;

        let (previous, row) = result.ok_or(StoreError::NotFound)?;
        let previous = previous
            .parse::<Role>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(RoleChange {
            previous,
            account: account_from_row(&row)?,
        })
    }

    #[instrument(skip(self), fields(account_id = %id, status = %status), err)]
    async fn update_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let pool = self.pool.clone();
        let sql = format!(
            "UPDATE accounts SET status = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = self
            .retry
            .run("update_status", is_transient, || {
                let pool = pool.clone();
                let sql = &sql;
                async move {
                    sqlx::query(sql)
                        .bind(id.as_uuid())
                        .bind(status.as_str())
                        .bind(now)
                        .fetch_optional(&*pool)
                        .await
                }
            })
            .await
            .map_err(|e| map_sqlx_error("update_status", e))?;
        account_from_row(&row.ok_or(StoreError::NotFound)?)
    }

    #[instrument(skip(self, update), fields(account_id = %id), err)]
    async fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let pool = self.pool.clone();
        let select_sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE");
        let update_sql = format!(
            "UPDATE accounts SET first_name = $2, last_name = $3, phone = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = self
            .retry
            .run("update_profile", is_transient, || {
                let pool = pool.clone();
                let (select_sql, update_sql) = (&select_sql, &update_sql);
                async move {
                    let mut tx = pool.begin().await?;
                    let Some(row) = sqlx::query(select_sql)
                        .bind(id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?
                    else {
                        tx.rollback().await?;
                        return Ok(None);
                    };
                    let mut account = match account_from_row(&row) {
                        Ok(a) => a,
                        Err(e) => return Err(sqlx::Error::Decode(Box::new(e))),
                    };
                    update.apply_to(&mut account, now);
                    let row = sqlx::query(update_sql)
                        .bind(id.as_uuid())
                        .bind(&account.first_name)
                        .bind(&account.last_name)
                        .bind(&account.phone)
                        .bind(account.updated_at)
                        .fetch_one(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    Ok::<_, sqlx::Error>(Some(row))
                }
            })
            .await
            .map_err(|e| map_sqlx_error("update_profile", e))?;
        account_from_row(&row.ok_or(StoreError::NotFound)?)
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn delete(&self, id: AccountId) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let result = self
            .retry
            .run("delete_account", is_transient, || {
                let pool = pool.clone();
                async move {
                    sqlx::query("DELETE FROM accounts WHERE id = $1")
                        .bind(id.as_uuid())
                        .execute(&*pool)
                        .await
                }
            })
            .await
            .map_err(|e| map_sqlx_error("delete_account", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let corrupt = |col: &str, e: &dyn std::fmt::Display| StoreError::Corrupt(format!("{col}: {e}"));

    let id: uuid::Uuid = row.try_get("id").map_err(|e| corrupt("id", &e))?;
    let role: String = row.try_get("role").map_err(|e| corrupt("role", &e))?;
    let status: String = row.try_get("status").map_err(|e| corrupt("status", &e))?;

    Ok(Account {
        id: AccountId::from_uuid(id),
        email: row.try_get("email").map_err(|e| corrupt("email", &e))?,
        first_name: row.try_get("first_name").map_err(|e| corrupt("first_name", &e))?,
        last_name: row.try_get("last_name").map_err(|e| corrupt("last_name", &e))?,
        phone: row.try_get("phone").map_err(|e| corrupt("phone", &e))?,
        role: role.parse().map_err(|e| corrupt("role", &e))?,
        status: status.parse().map_err(|e| corrupt("status", &e))?,
        created_at: row.try_get("created_at").map_err(|e| corrupt("created_at", &e))?,
        updated_at: row.try_get("updated_at").map_err(|e| corrupt("updated_at", &e))?,
    })
}

/// Failures worth retrying: the database may come back.
pub(crate) fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
    )
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Duplicate
            } else {
                let message = db_err.message();
                StoreError::Unavailable(format!("database error in {operation}: {message}"))
            }
        }
        sqlx::Error::Decode(e) => StoreError::Corrupt(format!("decode error in {operation}: {e}")),
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}
