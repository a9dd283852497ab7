//! Trust signals consulted before the session: request metadata that can
//! settle an authorization decision on its own.
//!
//! Each signal is a strategy object built from [`AuthConfig`]. The full set
//! and its evaluation order live in [`TrustSignals::from_config`].

use subtle::ConstantTimeEq;

use super::authorizer::AuthorizationResult;
use super::request_context::{RequestContext, INTERNAL_TOKEN_HEADER};
use super::role::Role;
use super::Principal;
use crate::config::{AuthConfig, Environment};

pub trait TrustSignal: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the signal can ever fire under its configuration.
    fn armed(&self) -> bool;

    /// `Some` settles the decision; `None` falls through to the next check.
    fn evaluate(&self, required: Role, ctx: &RequestContext) -> Option<AuthorizationResult>;
}

/// Server-to-server calls presenting the shared secret act as admin.
///
/// Must only be reachable from trusted network paths; the secret is the
/// sole gate.
pub struct InternalBypass {
    secret: Option<String>,
}

impl InternalBypass {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret: secret.filter(|s| !s.is_empty()) }
    }
}

impl TrustSignal for InternalBypass {
    fn name(&self) -> &'static str { "internal_bypass" }

    fn armed(&self) -> bool { self.secret.is_some() }

    fn evaluate(&self, _required: Role, ctx: &RequestContext) -> Option<AuthorizationResult> {
        let secret = self.secret.as_deref()?;
        let presented = ctx.header(INTERNAL_TOKEN_HEADER)?;
        if bool::from(presented.as_bytes().ct_eq(secret.as_bytes())) {
            Some(AuthorizationResult::allow(Principal::internal_service()))
        } else {
            None
        }
    }
}

/// Staging/test impersonation via `x-role-override`.
///
/// Ignored in production, and compiled to a no-op without the
/// `role-override` feature.
pub struct RoleOverride {
    environment: Environment,
}

impl RoleOverride {
    pub fn new(environment: Environment) -> Self { Self { environment } }
}

impl TrustSignal for RoleOverride {
    fn name(&self) -> &'static str { "role_override" }

    fn armed(&self) -> bool {
        cfg!(feature = "role-override") && !self.environment.is_production()
    }

    #[cfg(feature = "role-override")]
    fn evaluate(&self, required: Role, ctx: &RequestContext) -> Option<AuthorizationResult> {
        if self.environment.is_production() {
            return None;
        }
        let raw = ctx.header(super::request_context::ROLE_OVERRIDE_HEADER).filter(|v| !v.is_empty())?;
        let decision = match raw.parse::<Role>() {
            Ok(role) => {
                let principal = Principal::new(super::principal::ROLE_OVERRIDE_ID, role);
                if role.satisfies(required) {
                    AuthorizationResult::allow(principal)
                } else {
                    AuthorizationResult::deny(Some(principal), AuthorizationResult::requires_reason(required))
                }
            }
            // Unrecognized override names carry level 0, below every requirement.
            Err(_) => AuthorizationResult::deny(None, format!("Unrecognized role override: {raw}")),
        };
        Some(decision)
    }

    #[cfg(not(feature = "role-override"))]
    fn evaluate(&self, _required: Role, _ctx: &RequestContext) -> Option<AuthorizationResult> {
        None
    }
}

/// Ordered trust signals; the first to answer wins.
pub struct TrustSignals {
    signals: Vec<Box<dyn TrustSignal>>,
}

impl TrustSignals {
    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self {
            signals: vec![
                Box::new(InternalBypass::new(cfg.internal_token.clone())),
                Box::new(RoleOverride::new(cfg.environment)),
            ],
        }
    }

    pub fn none() -> Self { Self { signals: Vec::new() } }

    pub fn evaluate(&self, required: Role, ctx: &RequestContext) -> Option<AuthorizationResult> {
        self.signals.iter().find_map(|s| s.evaluate(required, ctx))
    }

    /// Names of signals that can fire under the current configuration.
    pub fn armed(&self) -> Vec<&'static str> {
        self.signals.iter().filter(|s| s.armed()).map(|s| s.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::request_context::ROLE_OVERRIDE_HEADER;

    #[test]
    fn bypass_requires_configured_nonempty_secret() {
        let sig = InternalBypass::new(None);
        let ctx = RequestContext::new().with_header(INTERNAL_TOKEN_HEADER, "");
        assert!(!sig.armed());
        assert!(sig.evaluate(Role::Admin, &ctx).is_none());

        let sig = InternalBypass::new(Some(String::new()));
        assert!(!sig.armed());
        assert!(sig.evaluate(Role::Admin, &ctx).is_none());
    }

    #[test]
    fn bypass_matches_exact_secret_only() {
        let sig = InternalBypass::new(Some("s3cret".into()));
        for wrong in ["", "S3CRET", "s3cret ", "s3cre", "s3crets"] {
            let ctx = RequestContext::new().with_header(INTERNAL_TOKEN_HEADER, wrong);
            assert!(sig.evaluate(Role::User, &ctx).is_none(), "{wrong:?}");
        }
        let ctx = RequestContext::new().with_header("X-Internal-Token", "s3cret");
        let r = sig.evaluate(Role::Admin, &ctx).unwrap();
        assert!(r.authorized);
        assert_eq!(r.principal, Some(Principal::internal_service()));
    }

    #[test]
    fn override_is_inert_in_production() {
        let sig = RoleOverride::new(Environment::Production);
        let ctx = RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "admin");
        assert!(!sig.armed());
        assert!(sig.evaluate(Role::User, &ctx).is_none());
    }

    #[cfg(feature = "role-override")]
    #[test]
    fn override_compares_levels_outside_production() {
        let sig = RoleOverride::new(Environment::Staging);
        let ctx = RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "moderator");
        assert!(sig.evaluate(Role::User, &ctx).unwrap().authorized);
        assert!(sig.evaluate(Role::Moderator, &ctx).unwrap().authorized);
        let denied = sig.evaluate(Role::Admin, &ctx).unwrap();
        assert!(!denied.authorized);
        assert_eq!(denied.reason.as_deref(), Some("Requires admin role"));

        let ctx = RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "Admin");
        let denied = sig.evaluate(Role::User, &ctx).unwrap();
        assert!(!denied.authorized);
        assert!(denied.principal.is_none());

        let ctx = RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "");
        assert!(sig.evaluate(Role::User, &ctx).is_none());
    }

    #[test]
    fn signals_evaluate_in_order() {
        let cfg = AuthConfig::new(Environment::Test, Some("tok".into()));
        let signals = TrustSignals::from_config(&cfg);
        let ctx = RequestContext::new()
            .with_header(INTERNAL_TOKEN_HEADER, "tok")
            .with_header(ROLE_OVERRIDE_HEADER, "user");
        let r = signals.evaluate(Role::Admin, &ctx).unwrap();
        assert!(r.authorized);
        assert_eq!(r.principal.unwrap().user_id, crate::identity::INTERNAL_SERVICE_ID);
        assert!(TrustSignals::none().evaluate(Role::Admin, &ctx).is_none());
    }
}
