//! Service wiring: picks storage backends from configuration and builds the
//! shared `AppServices` handed to every handler.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use ucaep_auth::{AuthorizationService, RbacRegistry, TokenIssuer};
use ucaep_infra::rate_limit::RedisRateLimiter;
use ucaep_infra::sessions::RedisSessionStore;
use ucaep_infra::{
    AppConfig, AuditLog, AuthService, CredentialStore, FixedWindowLimiter, InMemoryAuditLog,
    InMemoryCredentialStore, InMemorySessionStore, PasswordHasher, PostgresAuditLog,
    PostgresCredentialStore, RateLimiter, SessionStore,
};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Everything a request handler needs. Cheap to share behind an `Arc`.
pub struct AppServices {
    pub auth: AuthService,
    pub limiter: Arc<dyn RateLimiter>,
    pub registry: RbacRegistry,
    /// Peers allowed to report the client address via `X-Forwarded-For`.
    pub trusted_proxies: Vec<IpAddr>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices").field("auth", &self.auth).finish_non_exhaustive()
    }
}

impl AppServices {
    /// Postgres when `DATABASE_URL` is set, Redis when `REDIS_URL` is set,
    /// in-process otherwise.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt_secret, config.token_ttl)?);

        let (accounts, audit): (Arc<dyn CredentialStore>, Arc<dyn AuditLog>) =
            match config.database_url.as_deref() {
                Some(url) => {
                    let pool = PgPoolOptions::new()
                        .max_connections(10)
                        .acquire_timeout(Duration::from_secs(5))
                        .connect(url)
                        .await
                        .context("failed to connect to postgres")?;
                    let accounts = PostgresCredentialStore::new(pool.clone());
                    accounts.ensure_schema().await?;
                    let audit = PostgresAuditLog::new(pool);
                    audit.ensure_schema().await?;
                    info!("using postgres for accounts and audit log");
                    (Arc::new(accounts), Arc::new(audit))
                }
                None => {
                    warn!("DATABASE_URL not set; accounts and audit log are kept in memory");
                    (
                        Arc::new(InMemoryCredentialStore::new()),
                        Arc::new(InMemoryAuditLog::new(config.audit_capacity)),
                    )
                }
            };

        let (sessions, limiter): (Arc<dyn SessionStore>, Arc<dyn RateLimiter>) =
            match config.redis_url.as_deref() {
                Some(url) => {
                    let sessions = RedisSessionStore::connect(url, config.session_timeout)
                        .await
                        .context("failed to connect to redis for sessions")?;
                    let limiter =
                        RedisRateLimiter::connect(url, config.rate_limit_per_minute, RATE_WINDOW)
                            .await
                            .context("failed to connect to redis for rate limiting")?;
                    info!("using redis for sessions and rate limiting");
                    (Arc::new(sessions), Arc::new(limiter))
                }
                None => (
                    Arc::new(InMemorySessionStore::new()),
                    Arc::new(FixedWindowLimiter::new(config.rate_limit_per_minute, RATE_WINDOW)),
                ),
            };

        let services = Self::assemble(config, tokens, accounts, sessions, audit, limiter);
        services.bootstrap(config).await?;
        Ok(services)
    }

    fn assemble(
        config: &AppConfig,
        tokens: Arc<TokenIssuer>,
        accounts: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditLog>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let auth = AuthService::new(
            accounts,
            sessions,
            audit,
            tokens,
            PasswordHasher::new(config.bcrypt_cost),
            config.session_timeout,
        );
        Self {
            auth,
            limiter,
            registry: RbacRegistry::build(&AuthorizationService::new()),
            trusted_proxies: config.trusted_proxies.clone(),
        }
    }

    /// Seed the admin account from `ADMIN_EMAIL`/`ADMIN_PASSWORD`.
    pub async fn bootstrap(&self, config: &AppConfig) -> anyhow::Result<()> {
        let Some(seed) = &config.admin_seed else {
            return Ok(());
        };
        match self.auth.bootstrap_admin(&seed.email, &seed.password, Utc::now()).await? {
            Some(account) => info!(account_id = %account.id, "seeded admin account"),
            None => info!("admin account already present"),
        }
        Ok(())
    }
}
