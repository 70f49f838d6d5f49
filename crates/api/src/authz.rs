//! Handler-level authorization checks.
//!
//! The route guard middleware enforces route levels; these checks enforce the
//! specific permission a handler needs, server-side, before it acts.

use ucaep_auth::{AuthError, AuthorizationService, Permission};

use crate::context::PrincipalContext;

/// Require every permission in `required` for the caller's current role.
pub fn require_permissions(
    authz: &AuthorizationService,
    principal: &PrincipalContext,
    required: &[Permission],
) -> Result<(), AuthError> {
    for permission in required {
        authz.authorize(principal.role(), permission)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ucaep_auth::{Account, AccountStatus, Role, perms};
    use ucaep_core::{AccountId, SessionId};

    fn principal(role: Role) -> PrincipalContext {
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            email: "x@y.z".into(),
            first_name: "X".into(),
            last_name: "Y".into(),
            phone: None,
            role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        PrincipalContext::new(account, SessionId::new())
    }

    #[test]
    fn all_permissions_are_required() {
        let authz = AuthorizationService::new();
        let required = [perms::PROFILE_READ, perms::AUDIT_READ];
        assert!(require_permissions(&authz, &principal(Role::Admin), &required).is_ok());
        assert_eq!(
            require_permissions(&authz, &principal(Role::Producer), &required).unwrap_err(),
            AuthError::InsufficientPermissions("audit:read".to_string())
        );
    }
}
