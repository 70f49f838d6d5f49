use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier of the form `resource:action` (e.g. `news:publish`).
///
/// Permissions are never granted to an account directly; they are derived
/// from the account's [`Role`] through [`role_permissions`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource half of `resource:action`.
    pub fn resource(&self) -> &str {
        self.as_str().split_once(':').map_or(self.as_str(), |(r, _)| r)
    }

    /// Action half of `resource:action` (empty when malformed).
    pub fn action(&self) -> &str {
        self.as_str().split_once(':').map_or("", |(_, a)| a)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known permissions, grouped by resource.
pub mod perms {
    use super::Permission;

    pub const NEWS_READ: Permission = Permission::from_static("news:read");
    pub const NEWS_CREATE: Permission = Permission::from_static("news:create");
    pub const NEWS_UPDATE: Permission = Permission::from_static("news:update");
    pub const NEWS_PUBLISH: Permission = Permission::from_static("news:publish");
    pub const NEWS_DELETE: Permission = Permission::from_static("news:delete");

    pub const PRODUCER_READ: Permission = Permission::from_static("producer:read");
    pub const PRODUCER_CREATE: Permission = Permission::from_static("producer:create");
    pub const PRODUCER_UPDATE: Permission = Permission::from_static("producer:update");
    pub const PRODUCER_APPROVE: Permission = Permission::from_static("producer:approve");
    pub const PRODUCER_DELETE: Permission = Permission::from_static("producer:delete");

    pub const PARTNERSHIP_READ: Permission = Permission::from_static("partnership:read");
    pub const PARTNERSHIP_CREATE: Permission = Permission::from_static("partnership:create");
    pub const PARTNERSHIP_UPDATE: Permission = Permission::from_static("partnership:update");
    pub const PARTNERSHIP_DELETE: Permission = Permission::from_static("partnership:delete");

    pub const RESOURCE_READ: Permission = Permission::from_static("resource:read");
    pub const RESOURCE_CREATE: Permission = Permission::from_static("resource:create");
    pub const RESOURCE_UPDATE: Permission = Permission::from_static("resource:update");
    pub const RESOURCE_DELETE: Permission = Permission::from_static("resource:delete");

    pub const EVENT_READ: Permission = Permission::from_static("event:read");
    pub const EVENT_CREATE: Permission = Permission::from_static("event:create");
    pub const EVENT_UPDATE: Permission = Permission::from_static("event:update");
    pub const EVENT_DELETE: Permission = Permission::from_static("event:delete");

    pub const CONTACT_READ: Permission = Permission::from_static("contact:read");
    pub const CONTACT_RESPOND: Permission = Permission::from_static("contact:respond");

    pub const PROFILE_READ: Permission = Permission::from_static("profile:read");
    pub const PROFILE_UPDATE: Permission = Permission::from_static("profile:update");
    pub const DASHBOARD_VIEW: Permission = Permission::from_static("dashboard:view");

    pub const USER_READ: Permission = Permission::from_static("user:read");
    pub const USER_CREATE: Permission = Permission::from_static("user:create");
    pub const USER_UPDATE: Permission = Permission::from_static("user:update");
    pub const USER_DELETE: Permission = Permission::from_static("user:delete");
    pub const ROLE_ASSIGN: Permission = Permission::from_static("role:assign");
    pub const AUDIT_READ: Permission = Permission::from_static("audit:read");
    pub const SETTINGS_UPDATE: Permission = Permission::from_static("settings:update");
}

use perms::*;

// The nesting admin ⊇ moderator ⊇ producer ⊇ viewer is intended but every
// row is spelled out; `tests::tables_nest` catches drift.

const VIEWER: &[Permission] = &[
    NEWS_READ,
    PRODUCER_READ,
    PARTNERSHIP_READ,
    RESOURCE_READ,
    EVENT_READ,
    PROFILE_READ,
    PROFILE_UPDATE,
];

const PRODUCER: &[Permission] = &[
    NEWS_READ,
    PRODUCER_READ,
    PARTNERSHIP_READ,
    RESOURCE_READ,
    EVENT_READ,
    PROFILE_READ,
    PROFILE_UPDATE,
    DASHBOARD_VIEW,
    PRODUCER_CREATE,
    PRODUCER_UPDATE,
    RESOURCE_CREATE,
];

const MODERATOR: &[Permission] = &[
    NEWS_READ,
    PRODUCER_READ,
    PARTNERSHIP_READ,
    RESOURCE_READ,
    EVENT_READ,
    PROFILE_READ,
    PROFILE_UPDATE,
    DASHBOARD_VIEW,
    PRODUCER_CREATE,
    PRODUCER_UPDATE,
    RESOURCE_CREATE,
    NEWS_CREATE,
    NEWS_UPDATE,
    NEWS_PUBLISH,
    PRODUCER_APPROVE,
    PARTNERSHIP_CREATE,
    PARTNERSHIP_UPDATE,
    RESOURCE_UPDATE,
    EVENT_CREATE,
    EVENT_UPDATE,
    CONTACT_READ,
    CONTACT_RESPOND,
];

const ADMIN: &[Permission] = &[
    NEWS_READ,
    PRODUCER_READ,
    PARTNERSHIP_READ,
    RESOURCE_READ,
    EVENT_READ,
    PROFILE_READ,
    PROFILE_UPDATE,
    DASHBOARD_VIEW,
    PRODUCER_CREATE,
    PRODUCER_UPDATE,
    RESOURCE_CREATE,
    NEWS_CREATE,
    NEWS_UPDATE,
    NEWS_PUBLISH,
    PRODUCER_APPROVE,
    PARTNERSHIP_CREATE,
    PARTNERSHIP_UPDATE,
    RESOURCE_UPDATE,
    EVENT_CREATE,
    EVENT_UPDATE,
    CONTACT_READ,
    CONTACT_RESPOND,
    NEWS_DELETE,
    PRODUCER_DELETE,
    PARTNERSHIP_DELETE,
    RESOURCE_DELETE,
    EVENT_DELETE,
    USER_READ,
    USER_CREATE,
    USER_UPDATE,
    USER_DELETE,
    ROLE_ASSIGN,
    AUDIT_READ,
    SETTINGS_UPDATE,
];

/// The authoritative role → permission table.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::Viewer => VIEWER,
        Role::Producer => PRODUCER,
        Role::Moderator => MODERATOR,
        Role::Admin => ADMIN,
    }
}
