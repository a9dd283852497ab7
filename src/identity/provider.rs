use std::sync::Arc;

use crate::directory::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::tprintln;

use super::principal::{Attrs, Principal};
use super::role::Role;
use super::session::{Session, SessionManager};
use crate::directory::UserRecord;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub ip: Option<String>,
}

/// Self-service account creation. The new account always starts as `user`.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
}

/// Username/password login against the local user directory.
pub struct LocalAuthProvider {
    pub directory: Arc<UserDirectory>,
    pub sm: SessionManager,
}

impl LocalAuthProvider {
    pub fn new(directory: Arc<UserDirectory>, sm: SessionManager) -> Self { Self { directory, sm } }

    /// Create a `user` account and sign it in.
    pub fn signup(&self, req: &SignupRequest) -> AppResult<LoginResponse> {
        if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
            return Err(AppError::user("missing_fields", "Username, email, and password are required"));
        }
        let user = self.directory.add_user(&req.username, Some(req.email.clone()), &req.password, Role::User)?;
        let session = self.sm.issue(session_principal(&user, req.ip.clone()))?;
        tprintln!("auth.signup user={} sid={}", user.username, session.session_id);
        Ok(LoginResponse { session })
    }
}

fn session_principal(user: &UserRecord, ip: Option<String>) -> Principal {
    Principal {
        user_id: user.id.clone(),
        role: user.role,
        attrs: Attrs { username: Some(user.username.clone()), ip },
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let Some(user) = self.directory.authenticate(&req.username, &req.password) else {
            return Err(AppError::auth("invalid_credentials", "Invalid credentials"));
        };
        let session = self.sm.issue(session_principal(&user, req.ip.clone()))?;
        tprintln!("auth.login user={} sid={}", req.username, session.session_id);
        Ok(LoginResponse { session })
    }
}
