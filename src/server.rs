//!
//! rolegate HTTP server
//! --------------------
//! Axum routes for login/logout and role administration. Every gated route
//! asks the [`Authorizer`] for a decision at its required role and turns a
//! denial into a 401/403 through [`AppError`].
//!
//! Responsibilities:
//! - Signup, session cookie issue and teardown.
//! - Role listing and role changes (through the mutation guard).
//! - Role upgrade requests and their review.
//! - Admin user listing and audit log.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::directory::{UserDirectory, UserQuery, UserRecord};
use crate::error::{AppError, AppResult};
use crate::identity::{
    has_role, AuthProvider, Authorizer, DirectoryResolver, LocalAuthProvider, LoginRequest, LoginResponse,
    Principal, RequestContext, Role, RoleChangeRequest, SessionManager, SignupRequest, SESSION_COOKIE,
};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<UserDirectory>,
    pub sessions: SessionManager,
    pub authorizer: Arc<Authorizer>,
}

impl AppState {
    /// Wire the directory, session store and authorizer from configuration,
    /// seeding the default admin account.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let directory = Arc::new(UserDirectory::new());
        directory.ensure_default_admin(&config.admin_password)?;
        Ok(Self::with_directory(config, directory))
    }

    pub fn with_directory(config: AppConfig, directory: Arc<UserDirectory>) -> Self {
        let sessions = SessionManager::new(config.session_ttl);
        let resolver = Arc::new(DirectoryResolver::new(sessions.clone(), directory.clone()));
        let authorizer = Arc::new(Authorizer::from_config(&config.auth, resolver));
        Self { config: Arc::new(config), directory, sessions, authorizer }
    }

    /// Authorize the request at `required`, logging denials.
    pub async fn require(&self, headers: &HeaderMap, required: Role) -> AppResult<Principal> {
        let ctx = RequestContext::from_header_map(headers);
        let decision = self.authorizer.decide(required, &ctx).await;
        if !decision.authorized {
            warn!(
                target: "authz",
                required = %required,
                request_id = ?ctx.request_id,
                user_id = ?decision.principal.as_ref().map(|p| p.user_id.as_str()),
                reason = ?decision.reason,
                "denied"
            );
        }
        decision.into_result()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "rolegate ok" }))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/roles", get(list_roles).post(post_roles).put(review_request))
        .route("/api/moderate", get(moderation_queue))
        .route("/api/admin/users", get(admin_users))
        .route("/api/admin/logs", get(admin_logs))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let port = config.http_port;
    let state = AppState::new(config)?;
    let app = build_router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LoginPayload { username: String, password: String }

#[derive(Debug, Deserialize)]
struct SignupPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RolesAction {
    ChangeRole { target_user_id: String, new_role: String },
    RequestUpgrade { requested_role: String, #[serde(default)] reason: Option<String> },
}

#[derive(Debug, Deserialize)]
struct ReviewPayload { request_id: u64, approved: bool }

fn session_cookie(state: &AppState, token: &str) -> AppResult<HeaderValue> {
    let secure = if state.config.auth.environment.is_production() { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE, token, state.sessions.ttl.as_secs(), secure
    ))
    .map_err(|e| AppError::internal("cookie_encode", e.to_string()))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("rolegate_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/")
}

fn parse_role(raw: &str) -> AppResult<Role> {
    raw.parse::<Role>().map_err(|_| AppError::user("invalid_role", "Invalid role"))
}

async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignupPayload>,
) -> AppResult<impl IntoResponse> {
    let ctx = RequestContext::from_header_map(&headers);
    let provider = LocalAuthProvider::new(state.directory.clone(), state.sessions.clone());
    let req = SignupRequest { username: payload.username, email: payload.email, password: payload.password, ip: ctx.ip };
    let resp = match provider.signup(&req) {
        Ok(r) => r,
        Err(e) => {
            info!(target: "auth", username = %req.username, code = e.code_str(), "signup rejected");
            return Err(e);
        }
    };
    info!(target: "auth", user_id = %resp.session.principal.user_id, "account created");
    session_response(&state, resp)
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> AppResult<impl IntoResponse> {
    let ctx = RequestContext::from_header_map(&headers);
    let provider = LocalAuthProvider::new(state.directory.clone(), state.sessions.clone());
    let req = LoginRequest { username: payload.username, password: payload.password, ip: ctx.ip };
    let resp = match provider.login(&req) {
        Ok(r) => r,
        Err(e) => {
            info!(target: "auth", username = %req.username, "login rejected");
            return Err(e);
        }
    };
    session_response(&state, resp)
}

fn session_response(state: &AppState, resp: LoginResponse) -> AppResult<impl IntoResponse> {
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", session_cookie(state, &resp.session.token)?);
    let body = json!({
        "status": "ok",
        "user_id": resp.session.principal.user_id,
        "role": resp.session.principal.role,
        "token": resp.session.token,
    });
    Ok((StatusCode::OK, h, Json(body)))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = RequestContext::from_header_map(&headers);
    if let Some(token) = ctx.session_token.as_deref() {
        state.sessions.logout(token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<serde_json::Value>> {
    let principal = state.require(&headers, Role::User).await?;
    let satisfies: Vec<Role> = Role::ALL.into_iter().filter(|r| has_role(principal.role.as_str(), *r)).collect();
    Ok(Json(json!({
        "user_id": principal.user_id,
        "role": principal.role,
        "permissions": principal.role.permissions(),
        "satisfies": satisfies,
    })))
}

async fn list_roles(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<serde_json::Value>> {
    state.require(&headers, Role::Admin).await?;
    Ok(Json(json!({
        "users": state.directory.list_users(),
        "roles": Role::names(),
    })))
}

async fn post_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(raw): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let principal = state.require(&headers, Role::User).await?;
    let action: RolesAction = serde_json::from_value(raw)
        .map_err(|e| AppError::user("unknown_action", format!("Unknown action: {}", e)))?;
    match action {
        RolesAction::ChangeRole { target_user_id, new_role } => {
            let actor = state.require(&headers, Role::Admin).await?;
            let new_role = parse_role(&new_role)?;
            let updated = apply_role_change(&state, &actor, &target_user_id, new_role)?;
            Ok(Json(json!({"message": "Role updated successfully", "user": updated})))
        }
        RolesAction::RequestUpgrade { requested_role, reason } => {
            if principal.is_synthetic() {
                return Err(AppError::forbidden("no_account", "Upgrade requests need a user account"));
            }
            let requested = parse_role(&requested_role)?;
            if requested <= principal.role {
                return Err(AppError::user("invalid_upgrade", "Requested role must be above current role"));
            }
            let req = state.directory.submit_upgrade_request(&principal.user_id, requested, reason)?;
            info!(target: "roles", user_id = %principal.user_id, requested = %requested, request_id = req.id, "upgrade requested");
            Ok(Json(json!({"message": "Upgrade request submitted", "request": req})))
        }
    }
}

async fn review_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ReviewPayload>,
) -> AppResult<Json<serde_json::Value>> {
    let reviewer = state.require(&headers, Role::Admin).await?;
    // claim first: a request that is no longer pending never changes a role
    let req = state.directory.claim_pending(payload.request_id, payload.approved, &reviewer.user_id)?;
    if payload.approved {
        if let Err(e) = apply_role_change(&state, &reviewer, &req.user_id, req.requested_role) {
            state.directory.reopen(req.id, &reviewer.user_id);
            return Err(e);
        }
    }
    let action = if payload.approved { "ROLE_REQUEST_APPROVED" } else { "ROLE_REQUEST_REJECTED" };
    state.directory.record(&reviewer.user_id, action, Some(&req.user_id), format!("Request {} for {}", req.id, req.requested_role));
    let message = if payload.approved { "Request approved" } else { "Request rejected" };
    Ok(Json(json!({"message": message, "request": req})))
}

async fn moderation_queue(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<serde_json::Value>> {
    state.require(&headers, Role::Moderator).await?;
    Ok(Json(json!({"requests": state.directory.pending_requests()})))
}

async fn admin_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<serde_json::Value>> {
    state.require(&headers, Role::Admin).await?;
    let page = state.directory.search_users(&query);
    Ok(Json(json!({
        "users": page.users,
        "pagination": {"page": page.page, "limit": page.limit, "total": page.total, "pages": page.pages},
    })))
}

async fn admin_logs(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<serde_json::Value>> {
    state.require(&headers, Role::Admin).await?;
    Ok(Json(json!({"logs": state.directory.audit_log()})))
}

/// Guarded role change shared by direct edits and approved upgrade requests.
fn apply_role_change(state: &AppState, actor: &Principal, target_id: &str, new_role: Role) -> AppResult<UserRecord> {
    let target = state
        .directory
        .get(target_id)
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
    let change = RoleChangeRequest::new(actor.clone(), target.id.clone(), target.role, new_role);
    if let Err(denied) = change.check() {
        warn!(target: "roles", actor = %actor.user_id, target_user = %target.id, from = %target.role, to = %new_role, "role change denied: {}", denied);
        return Err(AppError::forbidden("role_change_denied", denied.to_string()));
    }
    let updated = state.directory.set_role(&target.id, new_role)?;
    if new_role < target.role && !change.is_self_change() {
        let dropped = state.sessions.revoke_user(&target.id);
        info!(target: "roles", target_user = %target.id, sessions = dropped, "revoked sessions of demoted user");
    }
    state.directory.record(&actor.user_id, "ROLE_CHANGE", Some(&target.id), format!("Changed role to {}", new_role));
    info!(target: "roles", actor = %actor.user_id, target_user = %target.id, from = %target.role, to = %new_role, "role changed");
    Ok(updated)
}
