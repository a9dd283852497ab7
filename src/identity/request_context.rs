use std::collections::HashMap;

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";
pub const ROLE_OVERRIDE_HEADER: &str = "x-role-override";
pub const SESSION_COOKIE: &str = "rolegate_session";

/// Ambient per-request input to authorization: headers (names lowercased),
/// the session token if one was presented, and the peer address.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: HashMap<String, String>,
    pub session_token: Option<String>,
    pub request_id: Option<String>,
    pub ip: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self { Self::default() }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Case-insensitive header lookup. Values are returned verbatim.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Build a context from raw HTTP headers. The session token is taken from
    /// the `rolegate_session` cookie, falling back to `Authorization: Bearer`.
    pub fn from_header_map(map: &axum::http::HeaderMap) -> Self {
        let mut ctx = RequestContext::new();
        for (name, value) in map.iter() {
            if let Ok(v) = value.to_str() {
                ctx.insert_header(name.as_str(), v);
            }
        }
        ctx.session_token = ctx
            .header("cookie")
            .and_then(|c| parse_cookie(c, SESSION_COOKIE))
            .or_else(|| {
                ctx.header("authorization")
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(|t| t.trim().to_string())
            })
            .filter(|t| !t.is_empty());
        ctx.request_id = ctx.header("x-request-id").map(str::to_string);
        ctx.ip = ctx
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        ctx
    }
}

fn parse_cookie(cookie: &str, name: &str) -> Option<String> {
    for part in cookie.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}
