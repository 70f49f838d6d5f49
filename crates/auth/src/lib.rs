//! `ucaep-auth`: the pure authentication/authorization boundary.
//!
//! Role model, permission tables, token claims, session timeout rules, the
//! route guard state machine and audit entry shape live here. Storage and
//! HTTP concerns are in `ucaep-infra` and `ucaep-api`.
//!
//! - No IO
//! - No panics

pub mod account;
pub mod audit;
pub mod authorize;
pub mod claims;
pub mod error;
pub mod guard;
pub mod permissions;
pub mod roles;
pub mod session;
pub mod token;

pub use account::{
    Account, AccountStatus, ProfileUpdate, Registration, ValidRegistration, MIN_PASSWORD_LEN,
    normalize_email,
};
pub use audit::{AuditAction, AuditEntry};
pub use authorize::{
    AuthorizationExplanation, AuthorizationService, PermissionDefinition, RbacRegistry,
    RoleDefinition,
};
pub use claims::{TOKEN_ISSUER, TokenClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use guard::{
    AccessRequirements, Denial, DenyReason, GuardDecision, GuardOutcome, Identity, IdentityState,
    Redirect, RouteGuard, RouteSecurityRules, SecurityLevel, check_route_access,
};
pub use permissions::{Permission, perms, role_permissions};
pub use roles::{Role, UnknownRole};
pub use session::{DEFAULT_SESSION_TIMEOUT_MINUTES, SessionTracker, session_is_valid};
pub use token::{DEFAULT_TOKEN_TTL_HOURS, TokenIssuer};
