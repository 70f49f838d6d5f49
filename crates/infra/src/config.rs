//! Configuration loaded from environment variables.

use std::net::{IpAddr, SocketAddr};

use chrono::Duration;
use thiserror::Error;

use ucaep_auth::{DEFAULT_SESSION_TIMEOUT_MINUTES, DEFAULT_TOKEN_TTL_HOURS};

pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const MIN_BCRYPT_COST: u32 = 10;
pub const MAX_BCRYPT_COST: u32 = 31;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 100;
pub const DEFAULT_AUDIT_CAPACITY: usize = 100;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET is not set; refusing to start without a signing secret")]
    MissingSecret,

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Seed credentials for the bootstrap admin account.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub session_timeout: Duration,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub rate_limit_per_minute: u32,
    pub audit_capacity: usize,
    pub bind_addr: SocketAddr,
    /// Reverse proxies whose `X-Forwarded-For` header is believed.
    pub trusted_proxies: Vec<IpAddr>,
    pub admin_seed: Option<AdminSeed>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_timeout", &self.session_timeout)
            .field("token_ttl", &self.token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<set>"))
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("audit_capacity", &self.audit_capacity)
            .field("bind_addr", &self.bind_addr)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("admin_seed", &self.admin_seed)
            .finish()
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

fn positive(key: &'static str, value: i64) -> Result<i64, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let session_minutes = positive(
            "SESSION_TIMEOUT_MINUTES",
            parse(&lookup, "SESSION_TIMEOUT_MINUTES", DEFAULT_SESSION_TIMEOUT_MINUTES)?,
        )?;
        let ttl_hours = positive(
            "TOKEN_TTL_HOURS",
            parse(&lookup, "TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?,
        )?;

        let bcrypt_cost: u32 = parse(&lookup, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: format!("{bcrypt_cost} is outside {MIN_BCRYPT_COST}..={MAX_BCRYPT_COST}"),
            });
        }

        let rate_limit_per_minute: u32 =
            parse(&lookup, "RATE_LIMIT_PER_MINUTE", DEFAULT_RATE_LIMIT_PER_MINUTE)?;
        if rate_limit_per_minute == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_PER_MINUTE",
                reason: "must be greater than zero".to_string(),
            });
        }

        let audit_capacity: usize = parse(&lookup, "AUDIT_CAPACITY", DEFAULT_AUDIT_CAPACITY)?;
        if audit_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "AUDIT_CAPACITY",
                reason: "must be greater than zero".to_string(),
            });
        }

        let bind_addr = parse(
            &lookup,
            "BIND_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;

        let trusted_proxies = lookup("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                    key: "TRUSTED_PROXIES",
                    reason: format!("'{v}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let admin_seed = match (non_empty("ADMIN_EMAIL"), non_empty("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            session_timeout: Duration::minutes(session_minutes),
            token_ttl: Duration::hours(ttl_hours),
            bcrypt_cost,
            database_url: non_empty("DATABASE_URL"),
            redis_url: non_empty("REDIS_URL"),
            rate_limit_per_minute,
            audit_capacity,
            bind_addr,
            trusted_proxies,
            admin_seed,
        })
    }

    /// Defaults with the given secret. Nothing else is read from the environment.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            session_timeout: Duration::minutes(DEFAULT_SESSION_TIMEOUT_MINUTES),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            database_url: None,
            redis_url: None,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            trusted_proxies: Vec::new(),
            admin_seed: None,
        }
    }
}
