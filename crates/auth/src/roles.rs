use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles form a closed, totally ordered set: `viewer < producer < moderator < admin`.
/// Role strings are parsed once at the boundary (token claims, request bodies,
/// database rows); everything past that point works with this enum.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    /// Assigned to self-registered accounts unless another role is requested.
    #[default]
    Producer,
    Moderator,
    Admin,
}

impl Role {
    /// All roles, lowest first.
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Producer, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Producer => "producer",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Integer rank used for "at least" checks.
    pub fn level(&self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::Producer => 2,
            Role::Moderator => 3,
            Role::Admin => 4,
        }
    }

    /// Rank of a raw role string; unknown roles rank 0.
    pub fn level_of(raw: &str) -> u8 {
        raw.parse::<Role>().map(|r| r.level()).unwrap_or(0)
    }

    /// Roles allowed to bypass resource ownership checks.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Viewer => "Read-only access to published content",
            Role::Producer => "Producer managing their own directory profile and resources",
            Role::Moderator => "Editor publishing news and approving producers",
            Role::Admin => "Full administrator, including account and role management",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "producer" => Ok(Role::Producer),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}
