//! Audit trail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ucaep_core::{AccountId, AuditEntryId};

use crate::Role;

/// Kind of security-relevant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AuthorizedAccess,
    UnauthorizedAccess,
    Login,
    LoginFailed,
    Logout,
    AccountRegistered,
    AccountCreated,
    RoleChanged,
    StatusChanged,
    AccountDeleted,
    RateLimited,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AuthorizedAccess => "authorized_access",
            AuditAction::UnauthorizedAccess => "unauthorized_access",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::AccountRegistered => "account_registered",
            AuditAction::AccountCreated => "account_created",
            AuditAction::RoleChanged => "role_changed",
            AuditAction::StatusChanged => "status_changed",
            AuditAction::AccountDeleted => "account_deleted",
            AuditAction::RateLimited => "rate_limited",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(JsonValue::String(s.to_string()))
            .map_err(|_| format!("unknown audit action '{s}'"))
    }
}

/// Immutable record of an access decision or sensitive mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    pub resource: String,
    pub actor_id: Option<AccountId>,
    pub role: Option<Role>,
    pub timestamp: DateTime<Utc>,
    pub details: JsonValue,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        resource: impl Into<String>,
        actor_id: Option<AccountId>,
        role: Option<Role>,
        details: JsonValue,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            action,
            resource: resource.into(),
            actor_id,
            role,
            timestamp,
            details,
        }
    }

    /// Entry stamped with the server clock.
    pub fn now(
        action: AuditAction,
        resource: impl Into<String>,
        actor_id: Option<AccountId>,
        role: Option<Role>,
        details: JsonValue,
    ) -> Self {
        Self::new(action, resource, actor_id, role, details, Utc::now())
    }

    /// Reason code recorded in `details.reason`, if any.
    pub fn reason(&self) -> Option<&str> {
        self.details.get("reason").and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_roundtrip() {
        for action in [
            AuditAction::AuthorizedAccess,
            AuditAction::UnauthorizedAccess,
            AuditAction::RoleChanged,
            AuditAction::RateLimited,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }
        assert!("shutdown".parse::<AuditAction>().is_err());
    }

    #[test]
    fn reason_reads_details() {
        let entry = AuditEntry::now(
            AuditAction::UnauthorizedAccess,
            "/admin",
            None,
            None,
            serde_json::json!({ "reason": "not_authenticated" }),
        );
        assert_eq!(entry.reason(), Some("not_authenticated"));
        assert_eq!(entry.action.to_string(), "unauthorized_access");
    }
}
