//! Append-only audit log sinks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::instrument;

use ucaep_auth::AuditEntry;
use ucaep_core::{AccountId, AuditEntryId};

use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit backend error: {0}")]
    Backend(String),
}

/// Append-only sink. Ordinary flows never mutate or delete entries.
#[async_trait::async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;

    /// Most recent entries, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError>;
}

/// Bounded ring buffer; the oldest entry is dropped once `capacity` is reached.
#[derive(Debug)]
pub struct InMemoryAuditLog {
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait::async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuditError::Backend("audit lock poisoned".to_string()))?;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AuditError::Backend("audit lock poisoned".to_string()))?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

/// Durable audit log in the `audit_log` table. Unbounded.
#[derive(Debug, Clone)]
pub struct PostgresAuditLog {
    pool: Arc<PgPool>,
    retry: RetryPolicy,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            retry: RetryPolicy::default(),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id         UUID PRIMARY KEY,
                action     TEXT NOT NULL,
                resource   TEXT NOT NULL,
                actor_id   UUID NULL,
                role       TEXT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                details    JSONB NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(backend)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS audit_log_occurred_at_idx \
             ON audit_log (occurred_at DESC)",
        )
            .execute(&*self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

fn backend(e: sqlx::Error) -> AuditError {
    AuditError::Backend(e.to_string())
}

#[async_trait::async_trait]
impl AuditLog for PostgresAuditLog {
    #[instrument(
        skip(self, entry),
        fields(action = %entry.action, resource = %entry.resource),
        err
    )]
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let pool = self.pool.clone();
        let entry = &entry;
        self.retry
            .run("append_audit", crate::accounts::is_transient, || {
                let pool = pool.clone();
                async move {
                    sqlx::query(
                        r#"
                        INSERT INTO audit_log
                            (id, action, resource, actor_id, role, occurred_at, details)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        "#,
                    )
                    .bind(entry.id.as_uuid())
                    .bind(entry.action.as_str())
                    .bind(&entry.resource)
                    .bind(entry.actor_id.map(|id| *id.as_uuid()))
                    .bind(entry.role.map(|r| r.as_str()))
                    .bind(entry.timestamp)
                    .bind(&entry.details)
                    .execute(&*pool)
                    .await
                }
            })
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let pool = self.pool.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .retry
            .run("recent_audit", crate::accounts::is_transient, || {
                let pool = pool.clone();
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, action, resource, actor_id, role, occurred_at, details
                        FROM audit_log
                        ORDER BY occurred_at DESC, id DESC
                        LIMIT $1
                        "#,
                    )
                    .bind(limit)
                    .fetch_all(&*pool)
                    .await
                }
            })
            .await
            .map_err(backend)?;
        rows.iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: &PgRow) -> Result<AuditEntry, AuditError> {
    let bad = |col: &str, e: &dyn std::fmt::Display| {
        AuditError::Backend(format!("corrupt audit row ({col}): {e}"))
    };

    let id: uuid::Uuid = row.try_get("id").map_err(|e| bad("id", &e))?;
    let action: String = row.try_get("action").map_err(|e| bad("action", &e))?;
    let actor_id: Option<uuid::Uuid> = row.try_get("actor_id").map_err(|e| bad("actor_id", &e))?;
    let role: Option<String> = row.try_get("role").map_err(|e| bad("role", &e))?;

    Ok(AuditEntry {
        id: AuditEntryId::from_uuid(id),
        action: action.parse().map_err(|e| bad("action", &e))?,
        resource: row.try_get("resource").map_err(|e| bad("resource", &e))?,
        actor_id: actor_id.map(AccountId::from_uuid),
        role: role
            .map(|r| r.parse())
            .transpose()
            .map_err(|e| bad("role", &e))?,
        timestamp: row.try_get("occurred_at").map_err(|e| bad("occurred_at", &e))?,
        details: row.try_get("details").map_err(|e| bad("details", &e))?,
    })
}
