//! Platform abstraction traits
//!
//! These traits define the boundary between the platform-agnostic session
//! logic and the runtime that hosts it (the native server, or mocks in tests).
//! Implementations must be shareable across request tasks.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SessionError};

/// Key-value cache with TTL support (uses raw bytes to be dyn-compatible)
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put_bytes(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()>;
}

/// HTTP client for outbound requests to the identity provider
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// HTTP response from an outbound request
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Clock for current time (enables testing with deterministic timestamps)
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Environment/secrets access
pub trait Environment {
    fn get_var(&self, name: &str) -> Result<String>;
    fn get_secret(&self, name: &str) -> Result<String>;
}

/// Typed cache get: deserialize from bytes
pub async fn cache_get<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>> {
    match cache.get_bytes(key).await? {
        Some(bytes) => {
            let value: T = serde_json::from_slice(&bytes).map_err(|e| {
                SessionError::internal(format!("cache deserialization error: {}", e))
            })?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Typed cache put: serialize to bytes
pub async fn cache_put<T: Serialize>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl_secs: u64,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| SessionError::internal(format!("cache serialization error: {}", e)))?;
    cache.put_bytes(key, &bytes, ttl_secs).await
}
