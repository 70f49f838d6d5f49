//! Fixed-window request counters keyed by actor + action.
//!
//! Limiting is best-effort: callers let the request through when the backend
//! fails.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `key` at `now`.
    async fn check(&self, key: &str, now: DateTime<Utc>) -> Result<RateDecision, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    index: i64,
    count: u32,
}

/// In-process fixed-window limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window_ms: i64,
    windows: Mutex<HashMap<String, Window>>,
}

const PRUNE_THRESHOLD: usize = 10_000;

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window_ms: (window.as_millis() as i64).max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    fn window_index(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis().div_euclid(self.window_ms)
    }

    fn retry_after(&self, index: i64, now: DateTime<Utc>) -> Duration {
        let window_end = (index + 1) * self.window_ms;
        let ms = (window_end - now.timestamp_millis()).max(0);
        // Round up so clients never retry inside the same window.
        Duration::from_secs((ms as u64).div_ceil(1000).max(1))
    }
}

#[async_trait::async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, key: &str, now: DateTime<Utc>) -> Result<RateDecision, RateLimitError> {
        let index = self.window_index(now);
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| RateLimitError::Backend("rate limiter lock poisoned".to_string()))?;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| w.index == index);
        }

        let window = windows
            .entry(key.to_string())
            .or_insert(Window { index, count: 0 });
        if window.index != index {
            *window = Window { index, count: 0 };
        }

        if window.count >= self.limit {
            return Ok(RateDecision::Limited {
                retry_after: self.retry_after(index, now),
            });
        }
        window.count += 1;
        Ok(RateDecision::Allowed {
            remaining: self.limit - window.count,
        })
    }
}

#[cfg(feature = "redis")]
pub use self::redis_limiter::RedisRateLimiter;

#[cfg(feature = "redis")]
mod redis_limiter {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use redis::aio::MultiplexedConnection;

    use super::{RateDecision, RateLimitError, RateLimiter};

    const KEY_PREFIX: &str = "ucaep:ratelimit";

    /// Fixed-window limiter shared across instances through `INCR` + `EXPIRE`.
    #[derive(Clone)]
    pub struct RedisRateLimiter {
        conn: MultiplexedConnection,
        limit: u32,
        window_secs: i64,
    }

    impl std::fmt::Debug for RedisRateLimiter {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisRateLimiter")
                .field("limit", &self.limit)
                .field("window_secs", &self.window_secs)
                .finish()
        }
    }

    fn backend(e: redis::RedisError) -> RateLimitError {
        RateLimitError::Backend(e.to_string())
    }

    impl RedisRateLimiter {
        pub async fn connect(
            redis_url: &str,
            limit: u32,
            window: Duration,
        ) -> Result<Self, RateLimitError> {
            let client = redis::Client::open(redis_url).map_err(backend)?;
            let conn = client.get_multiplexed_async_connection().await.map_err(backend)?;
            Ok(Self {
                conn,
                limit: limit.max(1),
                window_secs: (window.as_secs() as i64).max(1),
            })
        }
    }

    #[async_trait::async_trait]
    impl RateLimiter for RedisRateLimiter {
        async fn check(
            &self,
            key: &str,
            now: DateTime<Utc>,
        ) -> Result<RateDecision, RateLimitError> {
            let index = now.timestamp().div_euclid(self.window_secs);
            let redis_key = format!("{KEY_PREFIX}:{key}:{index}");
            let mut conn = self.conn.clone();

            let (count,): (u32,) = redis::pipe()
                .atomic()
                .incr(&redis_key, 1)
                .expire(&redis_key, self.window_secs)
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(backend)?;

            if count > self.limit {
                let window_end = (index + 1) * self.window_secs;
                let secs = (window_end - now.timestamp()).max(1) as u64;
                return Ok(RateDecision::Limited {
                    retry_after: Duration::from_secs(secs),
                });
            }
            Ok(RateDecision::Allowed {
                remaining: self.limit - count,
            })
        }
    }
}
