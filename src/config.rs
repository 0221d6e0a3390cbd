use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::auth::DEFAULT_TOKEN_TTL_DAYS;
use crate::db::DatabaseConfig;

/// Default address the API binds to.
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Default API base URL used by clients.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

/// Server-side settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub bind: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    /// Development mode: error responses carry internal detail.
    pub dev_mode: bool,
    pub database: DatabaseConfig,
}

impl PortalConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            jwt_secret: jwt_secret.into(),
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            dev_mode: false,
            database: DatabaseConfig::default(),
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.token_ttl_days)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT secret must not be empty (set PORTAL_JWT_SECRET)");
        }
        if self.token_ttl_days <= 0 {
            anyhow::bail!("Token lifetime must be at least one day");
        }
        Ok(())
    }
}

/// Client-side settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    /// Per-request timeout; `None` keeps the HTTP client's own default.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> anyhow::Result<Self> {
        let api_url = Url::parse(api_url).with_context(|| format!("Invalid API URL `{}`", api_url))?;
        Ok(Self {
            api_url,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Directory holding the client's persisted token.
///
/// `PORTAL_STATE_DIR` wins, then `$XDG_STATE_HOME/alumni-portal`, then
/// `./.alumni-portal`.
pub fn resolve_state_dir() -> PathBuf {
    if let Ok(p) = env::var("PORTAL_STATE_DIR") {
        return PathBuf::from(p);
    }

    if let Ok(xdg) = env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("alumni-portal");
    }

    PathBuf::from(".alumni-portal")
}
