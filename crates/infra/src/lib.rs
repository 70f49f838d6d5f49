//! Infrastructure layer: configuration, password hashing, and the storage
//! adapters behind the auth service (Postgres, Redis, in-memory).

pub mod accounts;
pub mod audit;
pub mod auth_service;
pub mod config;
pub mod passwords;
pub mod rate_limit;
pub mod retry;
pub mod sessions;

pub use accounts::{CredentialStore, InMemoryCredentialStore, PostgresCredentialStore, StoreError};
pub use audit::{AuditError, AuditLog, InMemoryAuditLog, PostgresAuditLog};
pub use auth_service::{AuthService, Authenticated, LoginOutcome};
pub use config::{AppConfig, ConfigError};
pub use passwords::PasswordHasher;
pub use rate_limit::{FixedWindowLimiter, RateDecision, RateLimitError, RateLimiter};
pub use retry::RetryPolicy;
pub use sessions::{InMemorySessionStore, SessionError, SessionStore};
