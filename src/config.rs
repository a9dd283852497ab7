//! Process-wide configuration read from `ROLEGATE_*` environment variables.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const ENV_VAR: &str = "ROLEGATE_ENV";
pub const INTERNAL_TOKEN_VAR: &str = "ROLEGATE_INTERNAL_TOKEN";
pub const HTTP_PORT_VAR: &str = "ROLEGATE_HTTP_PORT";
pub const SESSION_TTL_VAR: &str = "ROLEGATE_SESSION_TTL_SECS";
pub const ADMIN_PASSWORD_VAR: &str = "ROLEGATE_ADMIN_PASSWORD";

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 3600;
pub const DEFAULT_ADMIN_PASSWORD: &str = "rolegate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Development,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool { matches!(self, Environment::Production) }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::Test => "test",
        }
    }
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(AppError::config("invalid_environment", &format!("unknown {}: {}", ENV_VAR, other))),
        }
    }
}

/// Inputs to the trust signals consulted before session resolution.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub environment: Environment,
    /// Shared secret for server-to-server calls. `None` disables the bypass.
    pub internal_token: Option<String>,
}

impl AuthConfig {
    pub fn new(environment: Environment, internal_token: Option<String>) -> Self {
        let internal_token = internal_token.filter(|t| !t.is_empty());
        Self { environment, internal_token }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub http_port: u16,
    pub session_ttl: Duration,
    pub admin_password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            http_port: DEFAULT_HTTP_PORT,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build from an explicit variable map. Unset environment means production.
    pub fn from_vars(vars: &HashMap<String, String>) -> AppResult<Self> {
        let environment = match vars.get(ENV_VAR) {
            Some(v) => v.parse()?,
            None => Environment::Production,
        };
        let http_port = match vars.get(HTTP_PORT_VAR) {
            Some(v) => v.trim().parse::<u16>()
                .map_err(|e| AppError::config("invalid_port", &format!("{}: {}", HTTP_PORT_VAR, e)))?,
            None => DEFAULT_HTTP_PORT,
        };
        let ttl_secs = match vars.get(SESSION_TTL_VAR) {
            Some(v) => v.trim().parse::<u64>()
                .map_err(|e| AppError::config("invalid_session_ttl", &format!("{}: {}", SESSION_TTL_VAR, e)))?,
            None => DEFAULT_SESSION_TTL_SECS,
        };
        let admin_password = vars.get(ADMIN_PASSWORD_VAR).cloned()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());
        Ok(Self {
            auth: AuthConfig::new(environment, vars.get(INTERNAL_TOKEN_VAR).cloned()),
            http_port,
            session_ttl: Duration::from_secs(ttl_secs),
            admin_password,
        })
    }
}
