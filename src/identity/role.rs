//! Role registry: the closed set of roles and their privilege levels.
//!
//! The table is a compile-time constant. External role strings enter the
//! system through [`Role::from_str`] (strict, case-sensitive) or
//! [`level_of`] (unrecognized values collapse to level 0).

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Level assigned to any value outside the closed role set.
pub const UNRECOGNIZED_LEVEL: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl Role {
    /// Every role, lowest privilege first.
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    pub const fn level(self) -> u32 {
        match self {
            Role::User => 10,
            Role::Moderator => 50,
            Role::Admin => 100,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// True when this role is at least as trusted as `required`.
    pub const fn satisfies(self, required: Role) -> bool {
        self.level() >= required.level()
    }

    pub fn names() -> Vec<&'static str> {
        Role::ALL.iter().map(|r| r.as_str()).collect()
    }

    /// Static permission labels granted by the role.
    pub fn permissions(self) -> &'static [&'static str] {
        match self {
            Role::User => &["read:own", "write:own", "delete:own"],
            Role::Moderator => &["read:own", "write:own", "delete:own", "read:all", "moderate:content"],
            Role::Admin => &[
                "read:own",
                "write:own",
                "delete:own",
                "read:all",
                "write:all",
                "delete:all",
                "manage:users",
                "manage:roles",
            ],
        }
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    // Exact match only: "Admin" or " admin" are not roles.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privilege level of a role name, or [`UNRECOGNIZED_LEVEL`] for anything
/// outside the closed set.
pub fn level_of(role: &str) -> u32 {
    role.parse::<Role>().map(Role::level).unwrap_or(UNRECOGNIZED_LEVEL)
}
