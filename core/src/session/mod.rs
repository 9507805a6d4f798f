//! Session manager
//!
//! Mints tokens for the local superuser and verifies bearer tokens from
//! either trust source. One instance is built at startup and shared by all
//! request tasks.

mod dispatch;
mod issue;
mod login;
mod verify;

use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::claims::{self, Claims};
use crate::config::SessionSettings;
use crate::error::{Result, SessionError};
use crate::oidc::{DexRewriteClient, OidcProvider, Provider};
use crate::platform::{Cache, Clock, HttpClient};

/// Generates and validates session tokens
pub struct SessionManager {
    settings: SessionSettings,
    http: Arc<dyn HttpClient>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    /// Created on the first external verification. Concurrent first callers
    /// wait for a single construction.
    provider: OnceCell<Arc<dyn Provider>>,
}

impl SessionManager {
    /// Build a manager from static settings.
    ///
    /// When a gateway address is configured, `http` is wrapped so provider
    /// requests are sent there instead of the advertised issuer host.
    pub fn new(
        settings: SessionSettings,
        http: Arc<dyn HttpClient>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if settings.server_secret.is_empty() {
            return Err(SessionError::configuration("server secret cannot be empty"));
        }
        if settings.issuer.is_empty() {
            return Err(SessionError::configuration("session issuer cannot be empty"));
        }

        let http: Arc<dyn HttpClient> = match settings.dex_server_addr.as_deref() {
            Some(addr) => Arc::new(DexRewriteClient::new(addr, http)?),
            None => http,
        };

        Ok(Self {
            settings,
            http,
            cache,
            clock,
            provider: OnceCell::new(),
        })
    }

    /// Use `provider` for external tokens instead of building one from the
    /// configured issuer URL.
    pub fn with_provider(self, provider: Arc<dyn Provider>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(provider);
        Self {
            provider: cell,
            ..self
        }
    }

    /// `iss` value of locally minted tokens
    pub fn issuer(&self) -> &str {
        &self.settings.issuer
    }

    /// Human readable identity for verified claims
    pub fn display_name<'a>(&self, claims: &'a Claims) -> &'a str {
        claims::display_name(claims, &self.settings.issuer)
    }

    fn now_secs(&self) -> i64 {
        self.clock.now_secs() as i64
    }

    /// Provider handle, created on first use
    fn provider(&self) -> Result<Arc<dyn Provider>> {
        self.provider
            .get_or_try_init(|| {
                let issuer = self
                    .settings
                    .oidc_issuer
                    .as_deref()
                    .ok_or_else(|| SessionError::configuration("no OIDC issuer configured"))?;

                tracing::info!(issuer, "initializing OIDC provider");
                let provider =
                    OidcProvider::new(issuer, self.http.clone(), self.cache.clone(), self.clock.clone())?;
                Ok(Arc::new(provider) as Arc<dyn Provider>)
            })
            .cloned()
    }
}
