//! Route guard: the allow/deny decision for a protected resource.
//!
//! Evaluation order is fixed and later checks assume earlier ones passed:
//!
//! 1. identity still loading → `Loading`
//! 2. no identity (or stale session) → deny, redirect to login
//! 3. route rule level not met → deny `insufficient_security_level`
//! 4. declared role not equal → deny `insufficient_role`
//! 5. declared level: `admin` needs role == admin, others use `meets_level`
//! 6. declared permissions not all held → deny `insufficient_permissions`
//! 7. allow
//!
//! Every outcome except `Loading` carries the audit entry to append before
//! the response is produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use ucaep_core::AccountId;

use crate::audit::{AuditAction, AuditEntry};
use crate::{AuthError, AuthorizationService, Permission, Role};

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Coarse access tier attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Public,
    Authenticated,
    Producer,
    Moderator,
    Admin,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Public => "public",
            SecurityLevel::Authenticated => "authenticated",
            SecurityLevel::Producer => "producer",
            SecurityLevel::Moderator => "moderator",
            SecurityLevel::Admin => "admin",
        }
    }
}

impl core::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(SecurityLevel::Public),
            "authenticated" => Ok(SecurityLevel::Authenticated),
            "producer" => Ok(SecurityLevel::Producer),
            "moderator" => Ok(SecurityLevel::Moderator),
            "admin" => Ok(SecurityLevel::Admin),
            other => Err(format!("unknown security level '{other}'")),
        }
    }
}

/// Static path → level mapping. Longest segment prefix wins; unmapped paths are public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSecurityRules {
    rules: Vec<(String, SecurityLevel)>,
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or("");
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == path {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

impl RouteSecurityRules {
    pub fn new<P: Into<String>>(rules: impl IntoIterator<Item = (P, SecurityLevel)>) -> Self {
        let mut rules: Vec<(String, SecurityLevel)> = rules
            .into_iter()
            .map(|(p, l)| (normalize_path(&p.into()).to_string(), l))
            .collect();
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        rules.dedup_by(|a, b| a.0 == b.0);
        Self { rules }
    }

    /// Rules for the UCAEP site and its API.
    pub fn ucaep_defaults() -> Self {
        use SecurityLevel::*;
        Self::new([
            ("/", Public),
            ("/news", Public),
            ("/producers", Public),
            ("/partnerships", Public),
            ("/resources", Public),
            ("/events", Public),
            ("/contact", Public),
            ("/login", Public),
            ("/register", Public),
            ("/health", Public),
            ("/auth/login", Public),
            ("/auth/register", Public),
            ("/profile", Authenticated),
            ("/auth/me", Authenticated),
            ("/auth/profile", Authenticated),
            ("/auth/logout", Authenticated),
            ("/access", Authenticated),
            ("/rbac", Authenticated),
            ("/dashboard", Authenticated),
            ("/dashboard/producer", Producer),
            ("/dashboard/content", Moderator),
            ("/dashboard/moderation", Moderator),
            ("/dashboard/admin", Admin),
            ("/admin", Admin),
        ])
    }

    pub fn level_for(&self, path: &str) -> SecurityLevel {
        let path = normalize_path(path);
        self.rules
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map(|(_, level)| *level)
            .unwrap_or(SecurityLevel::Public)
    }

    pub fn rules(&self) -> &[(String, SecurityLevel)] {
        &self.rules
    }
}

impl Default for RouteSecurityRules {
    fn default() -> Self {
        Self::ucaep_defaults()
    }
}

/// Resolved identity of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub account_id: AccountId,
    pub role: Role,
    pub session_valid: bool,
}

/// What the guard knows about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    Loading,
    Anonymous,
    Authenticated(Identity),
}

impl IdentityState {
    fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityState::Authenticated(id) => Some(id),
            _ => None,
        }
    }
}

/// Whether `level` is satisfied by the caller. `admin` is a literal role match.
pub fn check_route_access(
    authz: &AuthorizationService,
    level: SecurityLevel,
    identity: Option<&Identity>,
) -> bool {
    if level == SecurityLevel::Public {
        return true;
    }
    let Some(identity) = identity.filter(|i| i.session_valid) else {
        return false;
    };
    match level {
        SecurityLevel::Public | SecurityLevel::Authenticated => true,
        SecurityLevel::Producer => authz.meets_level(identity.role, Role::Producer),
        SecurityLevel::Moderator => authz.meets_level(identity.role, Role::Moderator),
        SecurityLevel::Admin => identity.role == Role::Admin,
    }
}

/// Requirements declared by a specific resource on top of its route rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequirements {
    #[serde(default)]
    pub required_role: Option<Role>,
    #[serde(default)]
    pub required_level: Option<SecurityLevel>,
    #[serde(default)]
    pub required_permissions: Vec<Permission>,
}

impl AccessRequirements {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn role(role: Role) -> Self {
        Self {
            required_role: Some(role),
            ..Self::default()
        }
    }

    pub fn level(level: SecurityLevel) -> Self {
        Self {
            required_level: Some(level),
            ..Self::default()
        }
    }

    pub fn permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            required_permissions: permissions.into_iter().collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotAuthenticated,
    SessionExpired,
    InsufficientSecurityLevel,
    InsufficientRole,
    InsufficientPermissions,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "not_authenticated",
            DenyReason::SessionExpired => "session_expired",
            DenyReason::InsufficientSecurityLevel => "insufficient_security_level",
            DenyReason::InsufficientRole => "insufficient_role",
            DenyReason::InsufficientPermissions => "insufficient_permissions",
        }
    }

    /// Reason recorded in the audit entry.
    pub fn audit_reason(&self) -> &'static str {
        match self {
            DenyReason::InsufficientSecurityLevel => "insufficient_role_level",
            other => other.code(),
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(self, DenyReason::NotAuthenticated | DenyReason::SessionExpired)
    }
}

/// Where the caller should be sent after a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub to: String,
    /// Originally requested path, for redirect after login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub reason: DenyReason,
    pub message: String,
    /// Level, role or missing permissions that caused the denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    pub redirect: Redirect,
}

impl Denial {
    /// The error taxonomy entry for this denial.
    pub fn to_error(&self) -> AuthError {
        let required = self.required.clone().unwrap_or_default();
        match self.reason {
            DenyReason::NotAuthenticated => AuthError::TokenInvalid,
            DenyReason::SessionExpired => AuthError::SessionExpired,
            DenyReason::InsufficientSecurityLevel => {
                AuthError::InsufficientSecurityLevel { required }
            }
            DenyReason::InsufficientRole => AuthError::InsufficientRole { required },
            DenyReason::InsufficientPermissions => AuthError::InsufficientPermissions(required),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardDecision {
    Loading,
    Allow,
    Deny(Denial),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

#[derive(Debug, Clone)]
pub struct GuardOutcome {
    pub decision: GuardDecision,
    /// Entry the caller must append before acting on the decision.
    pub audit: Option<AuditEntry>,
}

/// Composes the authorization engine with route rules and session validity.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    authz: AuthorizationService,
    rules: RouteSecurityRules,
}

impl RouteGuard {
    pub fn new(authz: AuthorizationService, rules: RouteSecurityRules) -> Self {
        Self { authz, rules }
    }

    pub fn rules(&self) -> &RouteSecurityRules {
        &self.rules
    }

    pub fn evaluate(
        &self,
        path: &str,
        state: &IdentityState,
        requirements: &AccessRequirements,
        now: DateTime<Utc>,
    ) -> GuardOutcome {
        if *state == IdentityState::Loading {
            return GuardOutcome {
                decision: GuardDecision::Loading,
                audit: None,
            };
        }

        let route_level = self.rules.level_for(path);
        let identity = state.identity();

        match self.first_failure(route_level, identity, requirements) {
            Some((reason, required)) => {
                self.deny(path, route_level, identity, requirements, reason, required, now)
            }
            None => {
                let entry = AuditEntry::new(
                    AuditAction::AuthorizedAccess,
                    path,
                    identity.map(|i| i.account_id),
                    identity.map(|i| i.role),
                    json!({ "path": path, "route_level": route_level }),
                    now,
                );
                GuardOutcome {
                    decision: GuardDecision::Allow,
                    audit: Some(entry),
                }
            }
        }
    }

    /// Deny `path` for a reason established before the guard ran, such as a
    /// failed bearer authentication. Produces the same redirect and audit
    /// entry as [`RouteGuard::evaluate`] would for that reason.
    pub fn reject(
        &self,
        path: &str,
        reason: DenyReason,
        identity: Option<&Identity>,
        now: DateTime<Utc>,
    ) -> GuardOutcome {
        let route_level = self.rules.level_for(path);
        self.deny(path, route_level, identity, &AccessRequirements::none(), reason, None, now)
    }

    fn first_failure(
        &self,
        route_level: SecurityLevel,
        identity: Option<&Identity>,
        req: &AccessRequirements,
    ) -> Option<(DenyReason, Option<String>)> {
        let Some(identity) = identity else {
            return Some((DenyReason::NotAuthenticated, None));
        };
        if !identity.session_valid {
            return Some((DenyReason::SessionExpired, None));
        }

        if !check_route_access(&self.authz, route_level, Some(identity)) {
            return Some((DenyReason::InsufficientSecurityLevel, Some(route_level.to_string())));
        }

        if let Some(required) = req.required_role {
            if identity.role != required {
                return Some((DenyReason::InsufficientRole, Some(required.to_string())));
            }
        }

        if let Some(level) = req.required_level {
            let satisfied = match level {
                SecurityLevel::Admin => identity.role == Role::Admin,
                SecurityLevel::Public | SecurityLevel::Authenticated => true,
                SecurityLevel::Producer => self.authz.meets_level(identity.role, Role::Producer),
                SecurityLevel::Moderator => self.authz.meets_level(identity.role, Role::Moderator),
            };
            if !satisfied {
                return Some((DenyReason::InsufficientSecurityLevel, Some(level.to_string())));
            }
        }

        if !req.required_permissions.is_empty()
            && !self.authz.has_all_permissions(identity.role, &req.required_permissions)
        {
            let missing: Vec<&str> = req
                .required_permissions
                .iter()
                .filter(|p| !self.authz.has_permission(identity.role, p))
                .map(|p| p.as_str())
                .collect();
            return Some((DenyReason::InsufficientPermissions, Some(missing.join(","))));
        }

        None
    }

    #[allow(clippy::too_many_arguments)]
    fn deny(
        &self,
        path: &str,
        route_level: SecurityLevel,
        identity: Option<&Identity>,
        req: &AccessRequirements,
        reason: DenyReason,
        required: Option<String>,
        now: DateTime<Utc>,
    ) -> GuardOutcome {
        let redirect = if reason.requires_login() {
            Redirect {
                to: LOGIN_PATH.to_string(),
                return_to: Some(path.to_string()),
            }
        } else {
            Redirect {
                to: UNAUTHORIZED_PATH.to_string(),
                return_to: None,
            }
        };

        let message = match reason {
            DenyReason::NotAuthenticated => "please log in".to_string(),
            DenyReason::SessionExpired => {
                "your session has expired, please log in again".to_string()
            }
            DenyReason::InsufficientSecurityLevel if required.as_deref() == Some("admin") => {
                "admin access required".to_string()
            }
            DenyReason::InsufficientSecurityLevel => "insufficient access level".to_string(),
            DenyReason::InsufficientRole => "insufficient role".to_string(),
            DenyReason::InsufficientPermissions => "insufficient permissions".to_string(),
        };

        tracing::info!(
            path,
            reason = reason.code(),
            role = identity.map(|i| i.role.as_str()).unwrap_or("none"),
            "access denied"
        );

        let entry = AuditEntry::new(
            AuditAction::UnauthorizedAccess,
            path,
            identity.map(|i| i.account_id),
            identity.map(|i| i.role),
            json!({
                "path": path,
                "reason": reason.audit_reason(),
                "role": identity.map(|i| i.role),
                "route_level": route_level,
                "required": required,
                "required_role": req.required_role,
                "required_level": req.required_level,
                "required_permissions": req.required_permissions,
            }),
            now,
        );

        GuardOutcome {
            decision: GuardDecision::Deny(Denial {
                reason,
                message,
                required,
                redirect,
            }),
            audit: Some(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perms;
    use proptest::prelude::*;

    fn guard() -> RouteGuard {
        RouteGuard::default()
    }

    fn who(role: Role) -> IdentityState {
        IdentityState::Authenticated(Identity {
            account_id: AccountId::new(),
            role,
            session_valid: true,
        })
    }

    fn deny_reason(outcome: &GuardOutcome) -> Option<DenyReason> {
        match &outcome.decision {
            GuardDecision::Deny(d) => Some(d.reason),
            _ => None,
        }
    }

    #[test]
    fn loading_is_inconclusive_and_unaudited() {
        let none = AccessRequirements::none();
        let out = guard().evaluate("/admin", &IdentityState::Loading, &none, Utc::now());
        assert_eq!(out.decision, GuardDecision::Loading);
        assert!(out.audit.is_none());
    }

    #[test]
    fn anonymous_is_sent_to_login_with_return_path() {
        let out = guard().evaluate(
            "/dashboard/producer",
            &IdentityState::Anonymous,
            &AccessRequirements::none(),
            Utc::now(),
        );
        let GuardDecision::Deny(denial) = &out.decision else {
            panic!("expected deny");
        };
        assert_eq!(denial.reason, DenyReason::NotAuthenticated);
        assert_eq!(denial.redirect.to, LOGIN_PATH);
        assert_eq!(denial.redirect.return_to.as_deref(), Some("/dashboard/producer"));

        let entry = out.audit.unwrap();
        assert_eq!(entry.action, AuditAction::UnauthorizedAccess);
        assert_eq!(entry.reason(), Some("not_authenticated"));
        assert_eq!(entry.actor_id, None);
    }

    #[test]
    fn stale_session_is_sent_to_login() {
        let state = IdentityState::Authenticated(Identity {
            account_id: AccountId::new(),
            role: Role::Admin,
            session_valid: false,
        });
        let out = guard().evaluate("/admin", &state, &AccessRequirements::none(), Utc::now());
        assert_eq!(deny_reason(&out), Some(DenyReason::SessionExpired));
    }

    #[test]
    fn producer_on_admin_route_is_insufficient_security_level() {
        let none = AccessRequirements::none();
        let out = guard().evaluate("/admin/accounts", &who(Role::Producer), &none, Utc::now());
        let GuardDecision::Deny(denial) = &out.decision else {
            panic!("expected deny");
        };
        assert_eq!(denial.reason, DenyReason::InsufficientSecurityLevel);
        assert_eq!(denial.redirect.to, UNAUTHORIZED_PATH);
        assert_eq!(denial.message, "admin access required");

        let entry = out.audit.unwrap();
        assert_eq!(entry.reason(), Some("insufficient_role_level"));
        assert_eq!(entry.role, Some(Role::Producer));
        assert_eq!(entry.details["path"], "/admin/accounts");
        assert_eq!(entry.details["route_level"], "admin");
    }

    #[test]
    fn required_role_is_exact_equality() {
        let req = AccessRequirements::role(Role::Producer);
        let out = guard().evaluate("/dashboard", &who(Role::Admin), &req, Utc::now());
        assert_eq!(deny_reason(&out), Some(DenyReason::InsufficientRole));

        let out = guard().evaluate("/dashboard", &who(Role::Producer), &req, Utc::now());
        assert!(out.decision.is_allowed());
    }

    #[test]
    fn denials_map_onto_the_error_taxonomy() {
        let req = AccessRequirements::role(Role::Moderator);
        let out = guard().evaluate("/dashboard", &who(Role::Admin), &req, Utc::now());
        let GuardDecision::Deny(denial) = out.decision else {
            panic!("expected deny");
        };
        assert_eq!(
            denial.to_error(),
            AuthError::InsufficientRole {
                required: "moderator".into()
            }
        );

        let none = AccessRequirements::none();
        let out = guard().evaluate("/admin", &who(Role::Viewer), &none, Utc::now());
        let GuardDecision::Deny(denial) = out.decision else {
            panic!("expected deny");
        };
        assert_eq!(
            denial.to_error(),
            AuthError::InsufficientSecurityLevel {
                required: "admin".into()
            }
        );
    }

    #[test]
    fn reject_records_the_given_reason() {
        let out = guard().reject("/auth/me", DenyReason::SessionExpired, None, Utc::now());
        let GuardDecision::Deny(denial) = &out.decision else {
            panic!("expected deny");
        };
        assert_eq!(denial.reason, DenyReason::SessionExpired);
        assert_eq!(denial.redirect.to, LOGIN_PATH);
        assert_eq!(denial.redirect.return_to.as_deref(), Some("/auth/me"));

        let entry = out.audit.unwrap();
        assert_eq!(entry.action, AuditAction::UnauthorizedAccess);
        assert_eq!(entry.reason(), Some("session_expired"));
        assert_eq!(entry.details["route_level"], "authenticated");
    }

    #[test]
    fn declared_admin_level_needs_admin_role() {
        let req = AccessRequirements::level(SecurityLevel::Admin);
        let out = guard().evaluate("/dashboard", &who(Role::Moderator), &req, Utc::now());
        assert_eq!(deny_reason(&out), Some(DenyReason::InsufficientSecurityLevel));
        let out = guard().evaluate("/dashboard", &who(Role::Admin), &req, Utc::now());
        assert!(out.decision.is_allowed());
    }

    #[test]
    fn declared_lower_levels_use_at_least() {
        let req = AccessRequirements::level(SecurityLevel::Producer);
        let out = guard().evaluate("/dashboard", &who(Role::Moderator), &req, Utc::now());
        assert!(out.decision.is_allowed());
        let out = guard().evaluate("/dashboard", &who(Role::Viewer), &req, Utc::now());
        assert_eq!(deny_reason(&out), Some(DenyReason::InsufficientSecurityLevel));
    }

    #[test]
    fn permissions_must_all_be_present() {
        let req = AccessRequirements::permissions([perms::NEWS_READ, perms::NEWS_PUBLISH]);
        let out = guard().evaluate("/dashboard", &who(Role::Producer), &req, Utc::now());
        assert_eq!(deny_reason(&out), Some(DenyReason::InsufficientPermissions));
        assert_eq!(out.audit.unwrap().details["required"], "news:publish");

        let out = guard().evaluate("/dashboard", &who(Role::Moderator), &req, Utc::now());
        assert!(out.decision.is_allowed());
    }

    #[test]
    fn allow_emits_authorized_access() {
        let none = AccessRequirements::none();
        let out = guard().evaluate("/dashboard/content", &who(Role::Moderator), &none, Utc::now());
        assert!(out.decision.is_allowed());
        assert_eq!(out.audit.unwrap().action, AuditAction::AuthorizedAccess);
    }

    #[test]
    fn route_check_precedes_declared_requirements() {
        // Both the route rule and the declared role fail; the route rule is reported.
        let req = AccessRequirements::role(Role::Moderator);
        let out = guard().evaluate("/admin", &who(Role::Producer), &req, Utc::now());
        assert_eq!(deny_reason(&out), Some(DenyReason::InsufficientSecurityLevel));
    }

    #[test]
    fn rules_use_longest_segment_prefix() {
        let rules = RouteSecurityRules::ucaep_defaults();
        assert_eq!(rules.level_for("/admin"), SecurityLevel::Admin);
        assert_eq!(rules.level_for("/admin/accounts/42"), SecurityLevel::Admin);
        assert_eq!(rules.level_for("/administration"), SecurityLevel::Public);
        assert_eq!(rules.level_for("/dashboard"), SecurityLevel::Authenticated);
        assert_eq!(rules.level_for("/dashboard/producer/stats"), SecurityLevel::Producer);
        assert_eq!(rules.level_for("/dashboard/content/"), SecurityLevel::Moderator);
        assert_eq!(rules.level_for("/auth/me?x=1"), SecurityLevel::Authenticated);
        assert_eq!(rules.level_for("/news/42"), SecurityLevel::Public);
        assert_eq!(rules.level_for("/unmapped/page"), SecurityLevel::Public);
    }

    #[test]
    fn check_route_access_admin_is_literal() {
        let authz = AuthorizationService::new();
        let id = |role| Identity {
            account_id: AccountId::new(),
            role,
            session_valid: true,
        };
        assert!(check_route_access(&authz, SecurityLevel::Admin, Some(&id(Role::Admin))));
        assert!(!check_route_access(&authz, SecurityLevel::Admin, Some(&id(Role::Moderator))));
        assert!(check_route_access(&authz, SecurityLevel::Public, None));
        assert!(!check_route_access(&authz, SecurityLevel::Authenticated, None));
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        /// Property: an unmapped path is always public regardless of suffix.
        #[test]
        fn unmapped_paths_are_public(seg in "[a-z]{1,12}") {
            let rules = RouteSecurityRules::new([("/admin", SecurityLevel::Admin)]);
            prop_assume!(seg != "admin");
            prop_assert_eq!(rules.level_for(&format!("/{seg}")), SecurityLevel::Public);
        }

        /// Property: every decision other than Loading is audited.
        #[test]
        fn every_decision_is_audited(role in any_role(), idx in 0usize..4) {
            let paths = ["/admin", "/dashboard", "/dashboard/producer", "/dashboard/content"];
            let none = AccessRequirements::none();
            let out = guard().evaluate(paths[idx], &who(role), &none, Utc::now());
            prop_assert!(out.audit.is_some());
        }
    }
}
