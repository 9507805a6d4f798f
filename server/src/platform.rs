//! Native platform implementations
//!
//! Implements core platform traits using native Rust libraries:
//! - Cache: moka in-memory cache with per-entry TTL
//! - HttpClient: reqwest, with the transport timeouts from `TransportConfig`
//! - Clock: std::time::SystemTime
//! - Environment: std::env

use async_trait::async_trait;
use moka::Expiry;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use argocd_session_core::config::TransportConfig;
use argocd_session_core::error::{Result, SessionError};
use argocd_session_core::platform::{Cache, Clock, Environment, HttpClient, HttpResponse};

type CacheEntry = (Vec<u8>, Duration);

/// Expires each entry after the TTL it was stored with
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.1)
    }
}

/// In-memory cache for provider discovery documents and signing keys
pub struct MokaCache {
    cache: moka::future::Cache<String, CacheEntry>,
}

impl MokaCache {
    pub fn new() -> Self {
        Self {
            cache: moka::future::Cache::builder()
                .max_capacity(1000)
                .expire_after(EntryTtl)
                .build(),
        }
    }
}

#[async_trait]
impl Cache for MokaCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.cache.get(key).await.map(|(bytes, _)| bytes))
    }

    async fn put_bytes(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        self.cache
            .insert(key.to_string(), (value.to_vec(), Duration::from_secs(ttl_secs)))
            .await;
        Ok(())
    }
}

/// reqwest-based HTTP client
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// reqwest never sends `Expect: 100-continue`, so
    /// `expect_continue_timeout` has nothing to apply to.
    pub fn new(transport: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(transport.connect_timeout())
            .tcp_keepalive(transport.keep_alive)
            .timeout(transport.request_timeout)
            .build()
            .map_err(|e| SessionError::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut builder = self.client.get(url);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SessionError::upstream(format!("HTTP GET {} timed out", url))
            } else {
                SessionError::upstream(format!("HTTP GET failed: {}", e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| SessionError::upstream(format!("failed to read response: {}", e)))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// System clock using std::time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

/// Process environment; secrets are expected to be injected as env vars
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        std::env::var(name)
            .map_err(|_| SessionError::configuration(format!("environment variable '{}' not set", name)))
    }

    fn get_secret(&self, name: &str) -> Result<String> {
        std::env::var(name)
            .map_err(|_| SessionError::configuration(format!("secret '{}' not found in environment", name)))
    }
}
