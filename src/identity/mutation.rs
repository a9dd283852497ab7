//! Role mutation guard: who may move a principal between roles.
//!
//! The guard assumes its inputs are already members of the closed role set;
//! external role names are parsed into [`Role`] before a request is built.

use thiserror::Error;

use super::role::Role;
use super::Principal;

#[derive(Debug, Clone)]
pub struct RoleChangeRequest {
    pub actor: Principal,
    pub target_id: String,
    pub current_role: Role,
    pub desired_role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoleChangeDenied {
    #[error("Only admins can change roles")]
    NotAdmin,
    #[error("Cannot demote other admins")]
    DemotesOtherAdmin,
}

impl RoleChangeRequest {
    pub fn new(actor: Principal, target_id: impl Into<String>, current_role: Role, desired_role: Role) -> Self {
        Self { actor, target_id: target_id.into(), current_role, desired_role }
    }

    pub fn is_self_change(&self) -> bool { self.actor.user_id == self.target_id }

    pub fn check(&self) -> Result<(), RoleChangeDenied> {
        check_transition(self.current_role, self.desired_role, self.actor.role, self.is_self_change())
    }
}

pub fn can_change_role(request: &RoleChangeRequest) -> bool {
    request.check().is_ok()
}

/// Same rule as [`can_change_role`] when the caller holds roles rather than principals.
pub fn can_change_role_between(current: Role, target: Role, performer: Role, is_self: bool) -> bool {
    check_transition(current, target, performer, is_self).is_ok()
}

fn check_transition(current: Role, target: Role, performer: Role, is_self: bool) -> Result<(), RoleChangeDenied> {
    if performer != Role::Admin {
        return Err(RoleChangeDenied::NotAdmin);
    }
    // admins may step down, but not unseat each other
    if current == Role::Admin && target != Role::Admin && !is_self {
        return Err(RoleChangeDenied::DemotesOtherAdmin);
    }
    Ok(())
}
