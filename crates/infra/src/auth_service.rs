//! Authentication service: registration, login, bearer authentication,
//! admin account management and audit recording.
//!
//! Constructed once at startup and shared by request handlers; all state
//! lives in the injected stores.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use ucaep_auth::{
    AccessRequirements, Account, AccountStatus, AuditAction, AuditEntry, AuthError,
    AuthorizationService, DenyReason, GuardOutcome, Identity, IdentityState, Permission,
    ProfileUpdate, Registration, Role, RouteGuard, TokenClaims, TokenIssuer, ValidRegistration,
    normalize_email, perms, session_is_valid,
};
use ucaep_core::{AccountId, SessionId};

use crate::accounts::CredentialStore;
use crate::audit::AuditLog;
use crate::passwords::PasswordHasher;
use crate::sessions::SessionStore;

const LOGIN_RESOURCE: &str = "/auth/login";
const LOGOUT_RESOURCE: &str = "/auth/logout";
const REGISTER_RESOURCE: &str = "/auth/register";
const ACCOUNTS_RESOURCE: &str = "/admin/accounts";

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub account: Account,
    pub session: SessionId,
    pub expires_at: DateTime<Utc>,
}

/// A bearer token resolved to its live account and session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub account: Account,
    pub session: SessionId,
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditLog>,
    tokens: Arc<TokenIssuer>,
    hasher: PasswordHasher,
    authz: AuthorizationService,
    guard: RouteGuard,
    session_timeout: Duration,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("hasher", &self.hasher)
            .field("session_timeout", &self.session_timeout)
            .finish_non_exhaustive()
    }
}

fn session_backend(e: impl std::fmt::Display) -> AuthError {
    AuthError::DatabaseUnavailable(format!("session store: {e}"))
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditLog>,
        tokens: Arc<TokenIssuer>,
        hasher: PasswordHasher,
        session_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            sessions,
            audit,
            tokens,
            hasher,
            authz: AuthorizationService::new(),
            guard: RouteGuard::default(),
            session_timeout,
        }
    }

    pub fn with_guard(mut self, guard: RouteGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn authz(&self) -> &AuthorizationService {
        &self.authz
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    // ─────────────────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────────────────

    /// Append an entry. Sink failures are logged and do not fail the request.
    pub async fn record(&self, entry: AuditEntry) {
        info!(
            target: "audit",
            action = %entry.action,
            resource = %entry.resource,
            actor_id = ?entry.actor_id.map(|id| id.to_string()),
            role = ?entry.role.map(|r| r.as_str()),
            "audit"
        );
        if let Err(e) = self.audit.append(entry).await {
            warn!(error = %e, "failed to append audit entry");
        }
    }

    /// Recent audit entries, newest first. Admin only.
    pub async fn recent_audit(
        &self,
        actor: &Account,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, AuthError> {
        self.require_admin(actor, &perms::AUDIT_READ)?;
        self.audit
            .recent(limit)
            .await
            .map_err(|e| AuthError::DatabaseUnavailable(e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration & login
    // ─────────────────────────────────────────────────────────────────────

    /// Public self-service registration. Elevated roles are rejected.
    pub async fn register(
        &self,
        input: &Registration,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        let valid = input.validate_self_service()?;
        let account = self.create(valid, now).await?;
        info!(account_id = %account.id, role = %account.role, "account registered");
        self.record(AuditEntry::new(
            AuditAction::AccountRegistered,
            REGISTER_RESOURCE,
            Some(account.id),
            Some(account.role),
            json!({ "email": account.email }),
            now,
        ))
        .await;
        Ok(account)
    }

    /// Admin-created account with any role.
    pub async fn create_account(
        &self,
        actor: &Account,
        input: &Registration,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        self.require_admin(actor, &perms::USER_CREATE)?;
        let valid = input.validate()?;
        let account = self.create(valid, now).await?;
        info!(
            account_id = %account.id,
            role = %account.role,
            created_by = %actor.id,
            "account created"
        );
        self.record(AuditEntry::new(
            AuditAction::AccountCreated,
            ACCOUNTS_RESOURCE,
            Some(actor.id),
            Some(actor.role),
            json!({ "target": account.id, "email": account.email, "role": account.role }),
            now,
        ))
        .await;
        Ok(account)
    }

    async fn create(
        &self,
        valid: ValidRegistration,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        // Skip the hash when the email is obviously taken; the unique index is the real check.
        if self.accounts.find_by_email(&valid.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let hash = self.hasher.hash(valid.password).await?;
        let account = Account {
            id: AccountId::new(),
            email: valid.email,
            first_name: valid.first_name,
            last_name: valid.last_name,
            phone: valid.phone,
            role: valid.role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        Ok(self.accounts.insert(account, hash).await?)
    }

    /// Verify credentials, issue a token and start the session.
    ///
    /// Unknown email and wrong password are indistinguishable, in both the
    /// error and the time taken.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let record = self.accounts.find_by_email(&email).await?;

        let (account, hash) = match record {
            Some(r) => (Some(r.account), Some(r.password_hash)),
            None => (None, None),
        };
        let matched = self.hasher.verify(password.to_string(), hash).await;

        let account = match account {
            Some(account) if matched => account,
            _ => {
                self.record(AuditEntry::new(
                    AuditAction::LoginFailed,
                    LOGIN_RESOURCE,
                    None,
                    None,
                    json!({ "email": email, "reason": "invalid_credentials" }),
                    now,
                ))
                .await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !account.is_active() {
            self.record(AuditEntry::new(
                AuditAction::LoginFailed,
                LOGIN_RESOURCE,
                Some(account.id),
                Some(account.role),
                json!({ "reason": "account_inactive" }),
                now,
            ))
            .await;
            return Err(AuthError::AccountInactive);
        }

        let claims = TokenClaims::for_account(&account, now, self.tokens.ttl());
        let token = self.tokens.sign(&claims)?;
        self.sessions
            .start(claims.jti, account.id, now)
            .await
            .map_err(session_backend)?;

        info!(
            account_id = %account.id,
            session = %claims.jti,
            role = %account.role,
            "login succeeded"
        );
        self.record(AuditEntry::new(
            AuditAction::Login,
            LOGIN_RESOURCE,
            Some(account.id),
            Some(account.role),
            json!({}),
            now,
        ))
        .await;

        Ok(LoginOutcome {
            token,
            account,
            session: claims.jti,
            expires_at: claims.expires_at,
        })
    }

    /// Resolve a bearer token to the live account and refresh its session.
    ///
    /// The role comes from the store, not the token, so role changes apply on
    /// the next request. Missing, ended or stale sessions fail closed.
    pub async fn authenticate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Authenticated, AuthError> {
        let claims = self.tokens.verify(token, now)?;

        let account = self
            .accounts
            .get(claims.sub)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if !account.is_active() {
            return Err(AuthError::AccountInactive);
        }

        let last = self
            .sessions
            .last_activity(claims.jti)
            .await
            .map_err(session_backend)?;
        if !session_is_valid(last, now, self.session_timeout) {
            return Err(AuthError::SessionExpired);
        }

        // A logout racing this request wins.
        let live = self
            .sessions
            .touch(claims.jti, account.id, now)
            .await
            .map_err(session_backend)?;
        if !live {
            return Err(AuthError::SessionExpired);
        }
        Ok(Authenticated {
            account,
            session: claims.jti,
        })
    }

    /// End the session behind the current token. Other sessions of the
    /// account stay open.
    pub async fn logout(
        &self,
        account: &Account,
        session: SessionId,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.sessions.end(session).await.map_err(session_backend)?;
        info!(account_id = %account.id, session = %session, "logged out");
        self.record(AuditEntry::new(
            AuditAction::Logout,
            LOGOUT_RESOURCE,
            Some(account.id),
            Some(account.role),
            json!({}),
            now,
        ))
        .await;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Self-service
    // ─────────────────────────────────────────────────────────────────────

    pub async fn current_account(&self, id: AccountId) -> Result<Account, AuthError> {
        self.accounts.get(id).await?.ok_or(AuthError::NotFound)
    }

    pub async fn update_profile(
        &self,
        account: &Account,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        self.authz.authorize(account.role, &perms::PROFILE_UPDATE)?;
        let update = update.validate()?;
        Ok(self.accounts.update_profile(account.id, &update, now).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Access decisions
    // ─────────────────────────────────────────────────────────────────────

    /// Record a failed bearer authentication as a guard denial for `path`.
    ///
    /// The denial reason follows the failure: stale or expired credentials
    /// are `session_expired`, everything else `not_authenticated`. The exact
    /// error code is kept in the audit details.
    pub async fn reject_authentication(
        &self,
        path: &str,
        error: &AuthError,
        now: DateTime<Utc>,
    ) -> GuardOutcome {
        let reason = match error {
            AuthError::SessionExpired | AuthError::TokenExpired => DenyReason::SessionExpired,
            _ => DenyReason::NotAuthenticated,
        };
        let mut outcome = self.guard.reject(path, reason, None, now);
        if let Some(mut entry) = outcome.audit.take() {
            if let Some(details) = entry.details.as_object_mut() {
                details.insert("error".to_string(), json!(error.code()));
            }
            self.record(entry).await;
        }
        outcome
    }

    /// Run the route guard for `account` and record its audit entry.
    pub async fn evaluate_access(
        &self,
        account: Option<&Account>,
        path: &str,
        requirements: &AccessRequirements,
        now: DateTime<Utc>,
    ) -> GuardOutcome {
        let state = match account {
            Some(a) => IdentityState::Authenticated(Identity {
                account_id: a.id,
                role: a.role,
                session_valid: true,
            }),
            None => IdentityState::Anonymous,
        };
        let mut outcome = self.guard.evaluate(path, &state, requirements, now);
        if let Some(entry) = outcome.audit.take() {
            self.record(entry).await;
        }
        outcome
    }

    pub fn permissions_for(&self, role: Role) -> &'static [Permission] {
        self.authz.permissions_for(role)
    }

    /// Admin-equality plus the specific permission.
    pub fn require_admin(&self, actor: &Account, permission: &Permission) -> Result<(), AuthError> {
        if actor.role != Role::Admin {
            return Err(AuthError::InsufficientSecurityLevel {
                required: Role::Admin.to_string(),
            });
        }
        self.authz.authorize(actor.role, permission)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Administration
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_accounts(&self, actor: &Account) -> Result<Vec<Account>, AuthError> {
        self.require_admin(actor, &perms::USER_READ)?;
        Ok(self.accounts.list().await?)
    }

    pub async fn get_account(&self, actor: &Account, id: AccountId) -> Result<Account, AuthError> {
        self.require_admin(actor, &perms::USER_READ)?;
        self.current_account(id).await
    }

    pub async fn update_role(
        &self,
        actor: &Account,
        target: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        self.require_admin(actor, &perms::ROLE_ASSIGN)?;
        if actor.id == target && role != Role::Admin {
            return Err(AuthError::validation("role", "administrators cannot demote themselves"));
        }

        let change = self.accounts.update_role(target, role, now).await?;
        info!(
            account_id = %target,
            from = %change.previous,
            to = %role,
            changed_by = %actor.id,
            "role changed"
        );
        self.record(AuditEntry::new(
            AuditAction::RoleChanged,
            format!("{ACCOUNTS_RESOURCE}/{target}/role"),
            Some(actor.id),
            Some(actor.role),
            json!({ "target": target, "from": change.previous, "to": role }),
            now,
        ))
        .await;
        Ok(change.account)
    }

    pub async fn update_status(
        &self,
        actor: &Account,
        target: AccountId,
        status: AccountStatus,
        now: DateTime<Utc>,
    ) -> Result<Account, AuthError> {
        self.require_admin(actor, &perms::USER_UPDATE)?;
        if actor.id == target && status != AccountStatus::Active {
            return Err(AuthError::validation(
                "status",
                "administrators cannot deactivate themselves",
            ));
        }

        let account = self.accounts.update_status(target, status, now).await?;
        if status == AccountStatus::Inactive {
            self.end_sessions_best_effort(target).await;
        }
        info!(account_id = %target, status = %status, changed_by = %actor.id, "status changed");
        self.record(AuditEntry::new(
            AuditAction::StatusChanged,
            format!("{ACCOUNTS_RESOURCE}/{target}/status"),
            Some(actor.id),
            Some(actor.role),
            json!({ "target": target, "status": status.as_str() }),
            now,
        ))
        .await;
        Ok(account)
    }

    pub async fn delete_account(
        &self,
        actor: &Account,
        target: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.require_admin(actor, &perms::USER_DELETE)?;
        if actor.id == target {
            return Err(AuthError::validation("id", "administrators cannot delete themselves"));
        }

        self.accounts.delete(target).await?;
        self.end_sessions_best_effort(target).await;
        info!(account_id = %target, deleted_by = %actor.id, "account deleted");
        self.record(AuditEntry::new(
            AuditAction::AccountDeleted,
            format!("{ACCOUNTS_RESOURCE}/{target}"),
            Some(actor.id),
            Some(actor.role),
            json!({ "target": target }),
            now,
        ))
        .await;
        Ok(())
    }

    async fn end_sessions_best_effort(&self, account_id: AccountId) {
        // Authentication re-reads the account, so a stale session cannot be used anyway.
        if let Err(e) = self.sessions.end_all(account_id).await {
            warn!(account_id = %account_id, error = %e, "failed to end sessions");
        }
    }

    /// Seed an admin account when `email` is not yet registered.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthError> {
        if self.accounts.find_by_email(email).await?.is_some() {
            return Ok(None);
        }
        let seed = Registration {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "UCAEP".to_string(),
            last_name: "Administrator".to_string(),
            phone: None,
            role: Some(Role::Admin),
        };
        let account = match self.create(seed.validate()?, now).await {
            Ok(a) => a,
            // Another instance won the race.
            Err(AuthError::DuplicateEmail) => return Ok(None),
            Err(e) => return Err(e),
        };
        info!(account_id = %account.id, "bootstrap admin created");
        self.record(AuditEntry::new(
            AuditAction::AccountCreated,
            ACCOUNTS_RESOURCE,
            None,
            None,
            json!({ "target": account.id, "role": account.role, "bootstrap": true }),
            now,
        ))
        .await;
        Ok(Some(account))
    }
}
