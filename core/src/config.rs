//! Configuration and secrets management

use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::platform::Environment;

/// Issuer identity stamped into locally minted tokens
pub const DEFAULT_ISSUER: &str = "argocd";

/// Name of the built-in superuser account
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Lifetime of tokens minted by the login endpoint (24 hours)
pub const DEFAULT_SESSION_EXPIRY_SECS: i64 = 24 * 60 * 60;

/// Cache TTL for provider discovery documents (1 hour)
pub const DISCOVERY_CACHE_TTL_SECS: u64 = 3600;

/// Cache TTL for provider signing keys (5 minutes)
pub const JWKS_CACHE_TTL_SECS: u64 = 300;

/// Tolerated clock skew for `nbf` checks
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 60;

/// Credentials of the built-in superuser
#[derive(Clone)]
pub struct LocalAccount {
    pub username: String,
    pub password: String,
}

/// Static inputs of a [`crate::session::SessionManager`]
#[derive(Clone)]
pub struct SessionSettings {
    /// Shared HMAC secret for local tokens
    pub server_secret: String,
    /// `iss` value of local tokens
    pub issuer: String,
    /// Advertised issuer URL of the external identity provider
    pub oidc_issuer: Option<String>,
    /// Address the provider is actually reachable at (e.g. `http://dex:5556`)
    pub dex_server_addr: Option<String>,
    pub local_account: Option<LocalAccount>,
    /// Unix time of the last superuser credential change. Local tokens
    /// issued before it are rejected.
    pub credentials_changed_at: Option<i64>,
}

impl SessionSettings {
    pub fn new(server_secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            server_secret: server_secret.into(),
            issuer: issuer.into(),
            oidc_issuer: None,
            dex_server_addr: None,
            local_account: None,
            credentials_changed_at: None,
        }
    }

    pub fn with_oidc(mut self, issuer_url: impl Into<String>, dex_server_addr: Option<String>) -> Self {
        self.oidc_issuer = Some(issuer_url.into());
        self.dex_server_addr = dex_server_addr;
        self
    }

    pub fn with_local_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.local_account = Some(LocalAccount {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_credentials_changed_at(mut self, unix_secs: i64) -> Self {
        self.credentials_changed_at = Some(unix_secs);
        self
    }
}

/// Timeouts applied by the outbound transport used for provider requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub dial_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub expect_continue_timeout: Duration,
    pub keep_alive: Duration,
    /// Upper bound for a whole request, so a stalled provider cannot hold
    /// verification forever
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(10),
            expect_continue_timeout: Duration::from_secs(1),
            keep_alive: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl TransportConfig {
    /// Time allowed to establish a connection, TLS included
    pub fn connect_timeout(&self) -> Duration {
        self.dial_timeout + self.tls_handshake_timeout
    }
}

/// Application configuration loaded from environment
pub struct Config {
    pub session: SessionSettings,
    pub session_expiry_secs: i64,
}

impl Config {
    /// Load configuration from platform environment
    pub fn from_env(env: &dyn Environment) -> Result<Self> {
        let server_secret = env
            .get_secret("SERVER_SECRET")
            .map_err(|_| SessionError::configuration("SERVER_SECRET secret not set"))?;

        let issuer = optional_var(env, "SESSION_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string());
        let mut session = SessionSettings::new(server_secret, issuer);

        if let Some(oidc_issuer) = optional_var(env, "OIDC_ISSUER") {
            session = session.with_oidc(oidc_issuer, optional_var(env, "DEX_SERVER_ADDR"));
        }

        if let Ok(password) = env.get_secret("ADMIN_PASSWORD") {
            let username =
                optional_var(env, "ADMIN_USERNAME").unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());
            session = session.with_local_account(username, password);
        }

        if let Some(mtime) = optional_var(env, "ADMIN_PASSWORD_MTIME") {
            let mtime = mtime
                .parse::<i64>()
                .map_err(|_| SessionError::configuration("ADMIN_PASSWORD_MTIME must be unix seconds"))?;
            session = session.with_credentials_changed_at(mtime);
        }

        let session_expiry_secs = match optional_var(env, "SESSION_EXPIRY_SECS") {
            Some(value) => value
                .parse::<i64>()
                .map_err(|_| SessionError::configuration("SESSION_EXPIRY_SECS must be a number"))?,
            None => DEFAULT_SESSION_EXPIRY_SECS,
        };

        Ok(Self {
            session,
            session_expiry_secs,
        })
    }
}

fn optional_var(env: &dyn Environment, name: &str) -> Option<String> {
    env.get_var(name).ok().filter(|value| !value.is_empty())
}
