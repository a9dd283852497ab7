use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use parking_lot::RwLock;

use super::authorizer::SessionResolver;
use super::principal::Principal;
use super::request_context::RequestContext;
use crate::directory::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::tprintln;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Default)]
struct SessionTables {
    sessions: HashMap<SessionToken, Session>,
    user_index: HashMap<String, HashSet<SessionToken>>,
}

impl SessionTables {
    fn sweep_expired(&mut self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        if self.sessions.len() != before {
            let live = &self.sessions;
            self.user_index.retain(|_, toks| {
                toks.retain(|t| live.contains_key(t));
                !toks.is_empty()
            });
        }
        before - self.sessions.len()
    }
}

fn gen_id() -> AppResult<String> {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal("rng_unavailable", e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-process session store. Cloning shares the same tables.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    tables: Arc<RwLock<SessionTables>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(7 * 24 * 3600)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, tables: Arc::new(RwLock::new(SessionTables::default())) }
    }

    pub fn issue(&self, principal: Principal) -> AppResult<Session> {
        let now = Instant::now();
        let sid = gen_id()?;
        let token = gen_id()?;
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let swept = {
            let mut t = self.tables.write();
            let swept = t.sweep_expired(now);
            t.sessions.insert(token.clone(), sess.clone());
            t.user_index.entry(principal.user_id.clone()).or_default().insert(token);
            swept
        };
        tprintln!("session.issue user={} sid={} ttl_secs={} swept={}", principal.user_id, sid, self.ttl.as_secs(), swept);
        Ok(sess)
    }

    pub fn validate(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        {
            let t = self.tables.read();
            match t.sessions.get(token) {
                Some(s) if s.expires_at > now => return Some(s.principal.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // expired: drop it
        self.remove(token);
        None
    }

    pub fn logout(&self, token: &str) -> bool {
        self.remove(token)
    }

    /// Drop every live session of a user; returns how many were removed.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut t = self.tables.write();
        let tokens = t.user_index.remove(user_id).unwrap_or_default();
        let mut count = 0usize;
        for tok in tokens {
            if t.sessions.remove(&tok).is_some() { count += 1; }
        }
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }

    /// Unexpired sessions only.
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.tables.read().sessions.values().filter(|s| s.expires_at > now).count()
    }

    fn remove(&self, token: &str) -> bool {
        let mut t = self.tables.write();
        let Some(sess) = t.sessions.remove(token) else { return false; };
        let user_id = sess.principal.user_id;
        if let Some(set) = t.user_index.get_mut(&user_id) {
            set.remove(token);
            if set.is_empty() {
                t.user_index.remove(&user_id);
            }
        }
        true
    }
}

#[async_trait]
impl SessionResolver for SessionManager {
    async fn current_principal(&self, ctx: &RequestContext) -> Option<Principal> {
        let token = ctx.session_token.as_deref()?;
        self.validate(token)
    }
}

/// Session lookup that re-reads the user's current role from the directory,
/// so a role change applies on the next request without re-login.
pub struct DirectoryResolver {
    sessions: SessionManager,
    directory: Arc<UserDirectory>,
}

impl DirectoryResolver {
    pub fn new(sessions: SessionManager, directory: Arc<UserDirectory>) -> Self {
        Self { sessions, directory }
    }
}

#[async_trait]
impl SessionResolver for DirectoryResolver {
    async fn current_principal(&self, ctx: &RequestContext) -> Option<Principal> {
        let mut principal = self.sessions.current_principal(ctx).await?;
        let user = self.directory.get(&principal.user_id)?;
        principal.role = user.role;
        Some(principal)
    }
}
