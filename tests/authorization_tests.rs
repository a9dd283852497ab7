//! Decision-procedure properties: level ordering, trust-signal precedence,
//! session fallback, has_role exactness and the role mutation guard.

use std::sync::Arc;

use async_trait::async_trait;

use rolegate::config::{AuthConfig, Environment};
use rolegate::identity::{
    can_change_role, can_change_role_between, has_role, level_of, AuthorizationResult, Authorizer, Principal,
    RequestContext, Role, RoleChangeRequest, SessionResolver, INTERNAL_TOKEN_HEADER, ROLE_OVERRIDE_HEADER,
};

const SECRET: &str = "internal-secret";

struct FixedSession(Option<Principal>);

#[async_trait]
impl SessionResolver for FixedSession {
    async fn current_principal(&self, _ctx: &RequestContext) -> Option<Principal> {
        self.0.clone()
    }
}

fn authorizer(env: Environment, session: Option<Principal>) -> Authorizer {
    let cfg = AuthConfig::new(env, Some(SECRET.to_string()));
    Authorizer::from_config(&cfg, Arc::new(FixedSession(session)))
}

#[test]
fn level_order_matches_role_order() {
    let names = ["user", "moderator", "admin"];
    for (i, a) in names.iter().enumerate() {
        for (j, b) in names.iter().enumerate() {
            assert_eq!(level_of(a) >= level_of(b), i >= j, "{a} vs {b}");
        }
    }
}

#[tokio::test]
async fn internal_token_always_authorizes() {
    for env in [Environment::Production, Environment::Staging, Environment::Development, Environment::Test] {
        for session in [None, Some(Principal::new("u1", Role::User))] {
            let a = authorizer(env, session);
            for required in Role::ALL {
                let ctx = RequestContext::new().with_header(INTERNAL_TOKEN_HEADER, SECRET);
                let r = a.decide(required, &ctx).await;
                assert!(r.authorized, "{env:?} {required}");
                assert_eq!(r.principal.as_ref().map(|p| p.role), Some(Role::Admin));
            }
        }
    }
}

#[tokio::test]
async fn wrong_internal_token_falls_through() {
    let a = authorizer(Environment::Production, None);
    let ctx = RequestContext::new().with_header(INTERNAL_TOKEN_HEADER, "guess");
    let r = a.decide(Role::User, &ctx).await;
    assert!(!r.authorized);
    assert_eq!(r.reason.as_deref(), Some("Not authenticated"));
}

#[tokio::test]
async fn unset_secret_never_bypasses() {
    let cfg = AuthConfig::new(Environment::Production, None);
    let a = Authorizer::from_config(&cfg, Arc::new(FixedSession(None)));
    for presented in ["", "undefined", "null"] {
        let ctx = RequestContext::new().with_header(INTERNAL_TOKEN_HEADER, presented);
        assert!(!a.decide(Role::User, &ctx).await.authorized, "{presented:?}");
    }
    assert!(!a.decide(Role::User, &RequestContext::new()).await.authorized);
}

#[cfg(feature = "role-override")]
#[tokio::test]
async fn override_honored_only_outside_production() {
    let user = Some(Principal::new("u1", Role::User));
    let ctx = RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "admin");

    let staging = authorizer(Environment::Staging, user.clone());
    let r = staging.decide(Role::Admin, &ctx).await;
    assert!(r.authorized);
    assert_eq!(r.principal.as_ref().map(|p| p.role), Some(Role::Admin));
    assert_ne!(r.principal.as_ref().map(|p| p.user_id.as_str()), Some("u1"));

    let prod = authorizer(Environment::Production, user);
    let r = prod.decide(Role::Admin, &ctx).await;
    assert!(!r.authorized);
    assert_eq!(r.reason.as_deref(), Some("Requires admin role"));
    assert_eq!(r.principal.as_ref().map(|p| p.user_id.as_str()), Some("u1"));
}

#[cfg(feature = "role-override")]
#[tokio::test]
async fn override_ignores_session_entirely() {
    // an admin session does not rescue a low override
    let a = authorizer(Environment::Development, Some(Principal::new("a1", Role::Admin)));
    let ctx = RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "user");
    let r = a.decide(Role::Moderator, &ctx).await;
    assert!(!r.authorized);
    assert_eq!(r.reason.as_deref(), Some("Requires moderator role"));

    // and an override works without any session
    let a = authorizer(Environment::Test, None);
    let ctx = RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "moderator");
    assert!(a.decide(Role::Moderator, &ctx).await.authorized);
}

#[tokio::test]
async fn no_session_is_not_authenticated() {
    let a = authorizer(Environment::Production, None);
    let r = a.decide(Role::Admin, &RequestContext::new()).await;
    assert_eq!(r, AuthorizationResult { authorized: false, principal: None, reason: Some("Not authenticated".into()) });
}

#[tokio::test]
async fn user_lacks_moderator() {
    let a = authorizer(Environment::Production, Some(Principal::new("u1", Role::User)));
    let r = a.decide(Role::Moderator, &RequestContext::new()).await;
    assert!(!r.authorized);
    assert_eq!(r.reason.as_deref(), Some("Requires moderator role"));
}

#[tokio::test]
async fn admin_satisfies_user() {
    let a = authorizer(Environment::Production, Some(Principal::new("a1", Role::Admin)));
    let r = a.decide(Role::User, &RequestContext::new()).await;
    assert!(r.authorized);
    assert_eq!(r.principal, Some(Principal::new("a1", Role::Admin)));
}

#[tokio::test]
async fn decide_is_idempotent() {
    let a = authorizer(Environment::Staging, Some(Principal::new("m1", Role::Moderator)));
    let contexts = [
        RequestContext::new(),
        RequestContext::new().with_header(INTERNAL_TOKEN_HEADER, SECRET),
        RequestContext::new().with_header(ROLE_OVERRIDE_HEADER, "user"),
        RequestContext::new().with_header(INTERNAL_TOKEN_HEADER, "nope"),
    ];
    for ctx in &contexts {
        for required in Role::ALL {
            let first = a.decide(required, ctx).await;
            let second = a.decide(required, ctx).await;
            assert_eq!(first, second);
        }
    }
}

#[test]
fn has_role_is_exact() {
    assert!(has_role("admin", Role::Moderator));
    assert!(!has_role("user", Role::Moderator));
    // wrong case is not a role at all
    assert!(!has_role("Admin", Role::Moderator));
    assert!(!has_role("ADMIN", Role::User));
    assert!(!has_role("admin\0", Role::User));
}

#[test]
fn guard_self_vs_other_admin_demotion() {
    let me = Principal::new("admin-1", Role::Admin);
    let own = RoleChangeRequest::new(me.clone(), "admin-1", Role::Admin, Role::Moderator);
    assert!(can_change_role(&own));
    let other = RoleChangeRequest::new(me, "admin-2", Role::Admin, Role::Moderator);
    assert!(!can_change_role(&other));
}

#[test]
fn guard_ordinary_promotion() {
    assert!(can_change_role_between(Role::User, Role::Moderator, Role::Admin, false));
    let req = RoleChangeRequest::new(Principal::new("a", Role::Admin), "u", Role::User, Role::Moderator);
    assert!(can_change_role(&req));
}

#[test]
fn guard_rejects_moderator_performer() {
    for current in Role::ALL {
        for target in Role::ALL {
            let req = RoleChangeRequest::new(Principal::new("m", Role::Moderator), "x", current, target);
            assert!(!can_change_role(&req), "{current} -> {target}");
        }
    }
}
