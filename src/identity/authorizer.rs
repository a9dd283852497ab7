use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::request_context::RequestContext;
use super::role::{level_of, Role};
use super::trust::TrustSignals;
use super::Principal;
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Outcome of one authorization decision. Built fresh per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationResult {
    pub authorized: bool,
    pub principal: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuthorizationResult {
    pub fn allow(principal: Principal) -> Self {
        Self { authorized: true, principal: Some(principal), reason: None }
    }

    pub fn deny(principal: Option<Principal>, reason: impl Into<String>) -> Self {
        Self { authorized: false, principal, reason: Some(reason.into()) }
    }

    pub fn not_authenticated() -> Self { Self::deny(None, NOT_AUTHENTICATED) }

    pub fn requires_reason(required: Role) -> String { format!("Requires {} role", required) }

    /// Translate into the HTTP-facing error model: no resolved identity is a
    /// 401, an identity without sufficient role is a 403.
    pub fn into_result(self) -> AppResult<Principal> {
        match (self.authorized, self.principal, self.reason) {
            (true, Some(p), _) => Ok(p),
            (true, None, _) => Err(AppError::internal("authz_missing_principal", "authorized decision without principal")),
            (false, None, reason) => Err(AppError::auth("unauthorized", reason.unwrap_or_else(|| NOT_AUTHENTICATED.to_string()))),
            (false, Some(_), reason) => Err(AppError::forbidden("forbidden", reason.unwrap_or_else(|| "Forbidden".to_string()))),
        }
    }
}

/// Source of the authenticated principal for a request.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn current_principal(&self, ctx: &RequestContext) -> Option<Principal>;
}

#[async_trait]
impl<T: SessionResolver + ?Sized> SessionResolver for Arc<T> {
    async fn current_principal(&self, ctx: &RequestContext) -> Option<Principal> {
        (**self).current_principal(ctx).await
    }
}

/// Role-gated decision procedure: trust signals first, then the session.
pub struct Authorizer {
    signals: TrustSignals,
    resolver: Arc<dyn SessionResolver>,
}

impl Authorizer {
    pub fn new(signals: TrustSignals, resolver: Arc<dyn SessionResolver>) -> Self {
        Self { signals, resolver }
    }

    pub fn from_config(cfg: &AuthConfig, resolver: Arc<dyn SessionResolver>) -> Self {
        Self::new(TrustSignals::from_config(cfg), resolver)
    }

    /// Decide whether the caller described by `ctx` may act at `required`.
    /// Pure apart from the session lookup; logging denials is up to the caller.
    pub async fn decide(&self, required: Role, ctx: &RequestContext) -> AuthorizationResult {
        if let Some(settled) = self.signals.evaluate(required, ctx) {
            return settled;
        }
        let Some(principal) = self.resolver.current_principal(ctx).await else {
            return AuthorizationResult::not_authenticated();
        };
        if principal.role.satisfies(required) {
            AuthorizationResult::allow(principal)
        } else {
            AuthorizationResult::deny(Some(principal), AuthorizationResult::requires_reason(required))
        }
    }
}

/// Coarse check against an already-known role string. Exact match only:
/// anything outside the closed set (including other casings) has no privilege.
pub fn has_role(role: &str, required: Role) -> bool {
    level_of(role) >= required.level()
}
