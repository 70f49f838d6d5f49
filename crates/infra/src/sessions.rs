//! Server-side session activity, one entry per issued token (`jti`).
//!
//! Only the owning account and the last-activity timestamp are stored.
//! Validity is recomputed on each check with [`ucaep_auth::session_is_valid`];
//! there are no background sweeps.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;

use ucaep_core::{AccountId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Open `session` for `account_id` with activity at `at`.
    async fn start(
        &self,
        session: SessionId,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), SessionError>;

    /// Record activity at `at`. Returns `false` when the session is unknown
    /// (ended or expired); an unknown session is never recreated.
    async fn touch(
        &self,
        session: SessionId,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<bool, SessionError>;

    async fn last_activity(&self, session: SessionId)
    -> Result<Option<DateTime<Utc>>, SessionError>;

    /// Forget one session (logout).
    async fn end(&self, session: SessionId) -> Result<(), SessionError>;

    /// Forget every session of an account (deactivation, deletion).
    async fn end_all(&self, account_id: AccountId) -> Result<(), SessionError>;
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    account_id: AccountId,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Activity>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> SessionError {
    SessionError::Backend("session lock poisoned".to_string())
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn start(
        &self,
        session: SessionId,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let mut map = self.sessions.write().map_err(poisoned)?;
        map.insert(session, Activity { account_id, last_seen: at });
        Ok(())
    }

    async fn touch(
        &self,
        session: SessionId,
        _account_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<bool, SessionError> {
        let mut map = self.sessions.write().map_err(poisoned)?;
        let Some(activity) = map.get_mut(&session) else {
            return Ok(false);
        };
        // Never move the clock backwards for concurrent requests.
        if at > activity.last_seen {
            activity.last_seen = at;
        }
        Ok(true)
    }

    async fn last_activity(
        &self,
        session: SessionId,
    ) -> Result<Option<DateTime<Utc>>, SessionError> {
        let map = self.sessions.read().map_err(poisoned)?;
        Ok(map.get(&session).map(|a| a.last_seen))
    }

    async fn end(&self, session: SessionId) -> Result<(), SessionError> {
        let mut map = self.sessions.write().map_err(poisoned)?;
        map.remove(&session);
        Ok(())
    }

    async fn end_all(&self, account_id: AccountId) -> Result<(), SessionError> {
        let mut map = self.sessions.write().map_err(poisoned)?;
        map.retain(|_, a| a.account_id != account_id);
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisSessionStore;

#[cfg(feature = "redis")]
mod redis_store {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use redis::aio::MultiplexedConnection;
    use tracing::instrument;

    use ucaep_core::{AccountId, SessionId};

    use super::{SessionError, SessionStore};

    const KEY_PREFIX: &str = "ucaep:session";
    const INDEX_PREFIX: &str = "ucaep:account-sessions";

    /// Redis-backed session store.
    ///
    /// `ucaep:session:{jti}` holds the last activity in unix millis and
    /// expires a while after the inactivity timeout, so abandoned sessions do
    /// not accumulate. `ucaep:account-sessions:{account}` is a set of the
    /// account's session ids, used by `end_all`.
    #[derive(Clone)]
    pub struct RedisSessionStore {
        conn: MultiplexedConnection,
        ttl_secs: u64,
    }

    impl std::fmt::Debug for RedisSessionStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisSessionStore")
                .field("ttl_secs", &self.ttl_secs)
                .finish()
        }
    }

    fn backend(e: redis::RedisError) -> SessionError {
        SessionError::Backend(e.to_string())
    }

    fn key(session: SessionId) -> String {
        format!("{KEY_PREFIX}:{session}")
    }

    fn index_key(account_id: AccountId) -> String {
        format!("{INDEX_PREFIX}:{account_id}")
    }

    impl RedisSessionStore {
        pub async fn connect(
            redis_url: &str,
            session_timeout: Duration,
        ) -> Result<Self, SessionError> {
            let client = redis::Client::open(redis_url).map_err(backend)?;
            let conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(backend)?;
            let ttl_secs = (session_timeout.num_seconds().max(1) as u64).saturating_mul(2);
            Ok(Self { conn, ttl_secs })
        }
    }

    #[async_trait::async_trait]
    impl SessionStore for RedisSessionStore {
        #[instrument(skip(self), fields(session = %session, account_id = %account_id), err)]
        async fn start(
            &self,
            session: SessionId,
            account_id: AccountId,
            at: DateTime<Utc>,
        ) -> Result<(), SessionError> {
            let mut conn = self.conn.clone();
            let index = index_key(account_id);
            redis::pipe()
                .atomic()
                .cmd("SET")
                .arg(key(session))
                .arg(at.timestamp_millis())
                .arg("EX")
                .arg(self.ttl_secs)
                .ignore()
                .sadd(&index, session.to_string())
                .ignore()
                .expire(&index, self.ttl_secs as i64)
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(backend)
        }

        #[instrument(skip(self), fields(session = %session), err)]
        async fn touch(
            &self,
            session: SessionId,
            account_id: AccountId,
            at: DateTime<Utc>,
        ) -> Result<bool, SessionError> {
            let mut conn = self.conn.clone();
            // XX: only refresh a session that still exists.
            let (updated,): (Option<String>,) = redis::pipe()
                .atomic()
                .cmd("SET")
                .arg(key(session))
                .arg(at.timestamp_millis())
                .arg("XX")
                .arg("EX")
                .arg(self.ttl_secs)
                .expire(index_key(account_id), self.ttl_secs as i64)
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(backend)?;
            Ok(updated.is_some())
        }

        #[instrument(skip(self), fields(session = %session), err)]
        async fn last_activity(
            &self,
            session: SessionId,
        ) -> Result<Option<DateTime<Utc>>, SessionError> {
            let mut conn = self.conn.clone();
            let millis: Option<i64> = redis::cmd("GET")
                .arg(key(session))
                .query_async(&mut conn)
                .await
                .map_err(backend)?;
            Ok(millis.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
        }

        #[instrument(skip(self), fields(session = %session), err)]
        async fn end(&self, session: SessionId) -> Result<(), SessionError> {
            let mut conn = self.conn.clone();
            redis::cmd("DEL")
                .arg(key(session))
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(backend)
        }

        #[instrument(skip(self), fields(account_id = %account_id), err)]
        async fn end_all(&self, account_id: AccountId) -> Result<(), SessionError> {
            let mut conn = self.conn.clone();
            let index = index_key(account_id);
            let members: Vec<String> = redis::cmd("SMEMBERS")
                .arg(&index)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;

            let mut del = redis::cmd("DEL");
            del.arg(&index);
            for member in &members {
                del.arg(format!("{KEY_PREFIX}:{member}"));
            }
            del.query_async::<_, ()>(&mut conn).await.map_err(backend)
        }
    }
}
