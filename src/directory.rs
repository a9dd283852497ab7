//! In-memory user directory: accounts, role upgrade requests and the admin
//! audit log. Authorization decisions never touch this module directly; it
//! is what the HTTP handlers persist role changes into.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::Role;
use crate::security;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeRequest {
    pub id: u64,
    pub user_id: String,
    pub requested_role: Role,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub admin_id: String,
    pub action: String,
    pub target_user_id: Option<String>,
    pub details: String,
    pub at: DateTime<Utc>,
}

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Username,
    Email,
    Role,
    #[default]
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: usize,
    pub limit: usize,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self { search: None, sort_by: SortField::default(), sort_order: SortOrder::default(), page: 1, limit: DEFAULT_PAGE_LIMIT }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    by_username: HashMap<String, String>,
    by_email: HashMap<String, String>,
    requests: BTreeMap<u64, UpgradeRequest>,
    next_request_id: u64,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub struct UserDirectory {
    tables: RwLock<Tables>,
}

impl UserDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn add_user(&self, username: &str, email: Option<String>, password: &str, role: Role) -> AppResult<UserRecord> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::user("invalid_username", "username must not be empty"));
        }
        if password.is_empty() {
            return Err(AppError::user("invalid_password", "password must not be empty"));
        }
        let email = email.map(|e| e.trim().to_ascii_lowercase()).filter(|e| !e.is_empty());
        // hash outside the lock
        let password_hash = security::hash_password(password)?;
        let mut t = self.tables.write();
        if t.by_username.contains_key(username) {
            return Err(AppError::conflict("user_exists", format!("user {} already exists", username)));
        }
        if let Some(e) = email.as_deref() {
            if t.by_email.contains_key(e) {
                return Err(AppError::conflict("email_exists", "An account with this email already exists"));
            }
        }
        let rec = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email,
            role,
            password_hash,
            created_at: Utc::now(),
        };
        t.by_username.insert(rec.username.clone(), rec.id.clone());
        if let Some(e) = rec.email.clone() {
            t.by_email.insert(e, rec.id.clone());
        }
        t.users.insert(rec.id.clone(), rec.clone());
        Ok(rec)
    }

    /// Seed the `admin` account on first start. No-op when it already exists.
    pub fn ensure_default_admin(&self, password: &str) -> AppResult<()> {
        if self.find_by_username(DEFAULT_ADMIN_USERNAME).is_some() {
            return Ok(());
        }
        let rec = self.add_user(DEFAULT_ADMIN_USERNAME, None, password, Role::Admin)?;
        info!(target: "directory", user_id = %rec.id, "seeded default admin account");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<UserRecord> {
        self.tables.read().users.get(id).cloned()
    }

    pub fn find_by_username(&self, username: &str) -> Option<UserRecord> {
        let t = self.tables.read();
        t.by_username.get(username).and_then(|id| t.users.get(id)).cloned()
    }

    /// Newest accounts first.
    pub fn list_users(&self) -> Vec<UserRecord> {
        let mut out: Vec<UserRecord> = self.tables.read().users.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.username.cmp(&b.username)));
        out
    }

    /// Filtered, sorted page over all accounts for the admin listing.
    pub fn search_users(&self, query: &UserQuery) -> UserPage {
        let needle = query.search.as_deref().map(str::trim).unwrap_or("").to_lowercase();
        let mut users: Vec<UserRecord> = self
            .tables
            .read()
            .users
            .values()
            .filter(|u| {
                needle.is_empty()
                    || u.username.to_lowercase().contains(&needle)
                    || u.email.as_deref().is_some_and(|e| e.contains(&needle))
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            let ord = match query.sort_by {
                SortField::Username => a.username.cmp(&b.username),
                SortField::Email => a.email.cmp(&b.email),
                SortField::Role => a.role.cmp(&b.role),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            let ord = ord.then_with(|| a.id.cmp(&b.id));
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let total = users.len();
        let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
        let page = query.page.max(1);
        let users = users.into_iter().skip((page - 1).saturating_mul(limit)).take(limit).collect();
        UserPage { users, page, limit, total, pages: total.div_ceil(limit) }
    }

    /// Returns the account when the password matches. Unknown usernames still
    /// pay for one hash verification.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<UserRecord> {
        let Some(rec) = self.find_by_username(username) else {
            security::verify_dummy(password);
            return None;
        };
        security::verify_password(&rec.password_hash, password).then_some(rec)
    }

    pub fn set_role(&self, id: &str, role: Role) -> AppResult<UserRecord> {
        let mut t = self.tables.write();
        let rec = t.users.get_mut(id).ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
        rec.role = role;
        Ok(rec.clone())
    }

    /// One request per user: resubmitting replaces the earlier one and puts it
    /// back to pending.
    pub fn submit_upgrade_request(&self, user_id: &str, requested_role: Role, reason: Option<String>) -> AppResult<UpgradeRequest> {
        let mut t = self.tables.write();
        if !t.users.contains_key(user_id) {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        let existing = t.requests.values().find(|r| r.user_id == user_id).map(|r| r.id);
        let id = match existing {
            Some(id) => id,
            None => {
                t.next_request_id += 1;
                t.next_request_id
            }
        };
        let req = UpgradeRequest {
            id,
            user_id: user_id.to_string(),
            requested_role,
            reason,
            status: RequestStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        t.requests.insert(id, req.clone());
        Ok(req)
    }

    pub fn get_request(&self, id: u64) -> Option<UpgradeRequest> {
        self.tables.read().requests.get(&id).cloned()
    }

    pub fn pending_requests(&self) -> Vec<UpgradeRequest> {
        self.tables.read().requests.values().filter(|r| r.status == RequestStatus::Pending).cloned().collect()
    }

    /// Atomically move a pending request to its reviewed state. Only one
    /// reviewer can win; everyone else gets 409.
    pub fn claim_pending(&self, id: u64, approved: bool, reviewer: &str) -> AppResult<UpgradeRequest> {
        let mut t = self.tables.write();
        let req = t.requests.get_mut(&id).ok_or_else(|| AppError::not_found("request_not_found", "Request not found"))?;
        if req.status != RequestStatus::Pending {
            return Err(AppError::conflict("request_already_reviewed", "Request already reviewed"));
        }
        req.status = if approved { RequestStatus::Approved } else { RequestStatus::Rejected };
        req.reviewed_by = Some(reviewer.to_string());
        req.reviewed_at = Some(Utc::now());
        Ok(req.clone())
    }

    /// Undo a claim whose role change was refused, so the request stays in the queue.
    pub fn reopen(&self, id: u64, reviewer: &str) {
        let mut t = self.tables.write();
        if let Some(req) = t.requests.get_mut(&id) {
            if req.reviewed_by.as_deref() == Some(reviewer) {
                req.status = RequestStatus::Pending;
                req.reviewed_by = None;
                req.reviewed_at = None;
            }
        }
    }

    pub fn record(&self, admin_id: &str, action: &str, target_user_id: Option<&str>, details: impl Into<String>) {
        let entry = AuditEntry {
            admin_id: admin_id.to_string(),
            action: action.to_string(),
            target_user_id: target_user_id.map(str::to_string),
            details: details.into(),
            at: Utc::now(),
        };
        self.tables.write().audit.push(entry);
    }

    /// Newest entries first.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.tables.read().audit.iter().rev().cloned().collect()
    }
}
