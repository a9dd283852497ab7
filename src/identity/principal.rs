use serde::{Deserialize, Serialize};

use super::role::Role;

/// Identity of the synthetic principal produced by the internal-service bypass.
pub const INTERNAL_SERVICE_ID: &str = "internal-service";
/// Identity of the synthetic principal produced by a non-production role override.
pub const ROLE_OVERRIDE_ID: &str = "role-override";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attrs {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub attrs: Attrs,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: user_id.into(), role, attrs: Attrs::default() }
    }

    pub fn internal_service() -> Self {
        Self::new(INTERNAL_SERVICE_ID, Role::Admin)
    }

    pub fn is_synthetic(&self) -> bool {
        self.user_id == INTERNAL_SERVICE_ID || self.user_id == ROLE_OVERRIDE_ID
    }
}
