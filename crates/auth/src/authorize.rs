use std::collections::BTreeMap;

use serde::Serialize;

use ucaep_core::AccountId;

use crate::permissions::role_permissions;
use crate::{AuthError, Permission, Role};

/// Role-based authorization decisions.
///
/// Stateless and cheap to clone; constructed once at startup and handed to
/// request handlers instead of living in a global.
///
/// - No IO
/// - No panics
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationService;

impl AuthorizationService {
    pub fn new() -> Self {
        Self
    }

    /// Immutable permission set for a role.
    pub fn permissions_for(&self, role: Role) -> &'static [Permission] {
        role_permissions(role)
    }

    pub fn has_permission(&self, role: Role, permission: &Permission) -> bool {
        self.permissions_for(role).contains(permission)
    }

    pub fn has_any_permission(&self, role: Role, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has_permission(role, p))
    }

    pub fn has_all_permissions(&self, role: Role, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(role, p))
    }

    /// Rank of a raw role string (`viewer`=1 … `admin`=4, unknown = 0).
    pub fn role_level(&self, role: &str) -> u8 {
        Role::level_of(role)
    }

    pub fn meets_level(&self, role: Role, required: Role) -> bool {
        role.level() >= required.level()
    }

    /// Elevated roles bypass ownership; everyone else must own the resource.
    pub fn can_edit_resource(&self, role: Role, owner_id: AccountId, actor_id: AccountId) -> bool {
        role.is_elevated() || owner_id == actor_id
    }

    /// `Ok(())` when `role` holds `permission`, otherwise `InsufficientPermissions`.
    pub fn authorize(&self, role: Role, permission: &Permission) -> Result<(), AuthError> {
        if self.has_permission(role, permission) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions(permission.to_string()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Answers "why was this request allowed/denied?" for a role and a permission.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub role: Role,
    pub granted: bool,
    pub reason: String,
    pub effective_permissions: Vec<String>,
    /// Lowest role that would grant the permission, if any does.
    pub minimum_granting_role: Option<Role>,
}

impl AuthorizationService {
    pub fn explain(&self, role: Role, required: &Permission) -> AuthorizationExplanation {
        let granted = self.has_permission(role, required);
        let minimum_granting_role = Role::ALL
            .into_iter()
            .find(|r| self.has_permission(*r, required));

        let reason = match (granted, minimum_granting_role) {
            (true, _) => format!("role '{role}' grants '{required}'"),
            (false, Some(min)) => {
                format!("role '{role}' does not grant '{required}'; requires '{min}' or higher")
            }
            (false, None) => format!("no role grants '{required}'"),
        };

        let mut effective_permissions: Vec<String> = self
            .permissions_for(role)
            .iter()
            .map(|p| p.to_string())
            .collect();
        effective_permissions.sort();

        AuthorizationExplanation {
            required_permission: required.to_string(),
            role,
            granted,
            reason,
            effective_permissions,
            minimum_granting_role,
        }
    }
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: Role,
    pub level: u8,
    pub description: &'static str,
    pub permissions: Vec<String>,
}

/// Permission definition (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub granted_to: Vec<Role>,
}

/// Read-only view of the RBAC table, derived from [`role_permissions`].
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: Vec<RoleDefinition>,
    pub permissions: BTreeMap<String, PermissionDefinition>,
}

impl RbacRegistry {
    pub fn build(authz: &AuthorizationService) -> Self {
        let mut permissions: BTreeMap<String, PermissionDefinition> = BTreeMap::new();
        let mut roles = Vec::with_capacity(Role::ALL.len());

        for role in Role::ALL {
            let perms = authz.permissions_for(role);
            for perm in perms {
                permissions
                    .entry(perm.to_string())
                    .or_insert_with(|| PermissionDefinition {
                        name: perm.to_string(),
                        resource: perm.resource().to_string(),
                        action: perm.action().to_string(),
                        granted_to: Vec::new(),
                    })
                    .granted_to
                    .push(role);
            }

            roles.push(RoleDefinition {
                name: role,
                level: role.level(),
                description: role.description(),
                permissions: perms.iter().map(|p| p.to_string()).collect(),
            });
        }

        Self { roles, permissions }
    }

    pub fn role(&self, role: Role) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.name == role)
    }
}
