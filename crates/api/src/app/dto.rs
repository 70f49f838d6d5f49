use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ucaep_auth::{
    AccessRequirements, Account, AccountStatus, AuthError, AuditEntry, GuardDecision, Role,
};
use ucaep_core::AccountId;

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

impl UpdateRoleRequest {
    pub fn parse(&self) -> Result<Role, AuthError> {
        self.role
            .parse()
            .map_err(|e: ucaep_auth::UnknownRole| AuthError::validation("role", e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

impl UpdateStatusRequest {
    pub fn parse(&self) -> Result<AccountStatus, AuthError> {
        self.status
            .parse()
            .map_err(|_| AuthError::validation("status", "status must be 'active' or 'inactive'"))
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessCheckRequest {
    pub path: String,
    #[serde(flatten)]
    pub requirements: AccessRequirements,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanEditRequest {
    pub owner_id: AccountId,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
    /// Role to explain for; defaults to the caller's role.
    pub role: Option<Role>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Account as returned over HTTP. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            email: a.email.clone(),
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            phone: a.phone.clone(),
            role: a.role,
            status: a.status,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: AccountView,
}

impl From<&Account> for UserEnvelope {
    fn from(a: &Account) -> Self {
        Self { user: a.into() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AccountView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: AccountView,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryView {
    pub id: String,
    pub action: String,
    pub resource: String,
    pub actor_id: Option<AccountId>,
    pub role: Option<Role>,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl From<AuditEntry> for AuditEntryView {
    fn from(e: AuditEntry) -> Self {
        Self {
            id: e.id.to_string(),
            action: e.action.to_string(),
            resource: e.resource,
            actor_id: e.actor_id,
            role: e.role,
            timestamp: e.timestamp,
            details: e.details,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckResponse {
    pub path: String,
    pub allowed: bool,
    pub decision: GuardDecision,
}
