//! Gateway URL rewriting
//!
//! The provider advertises an external issuer URL (e.g.
//! `https://cd.example.com/api/dex`) that is often not reachable from inside
//! the deployment. Requests are sent to the gateway address instead, keeping
//! path and query intact.

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::error::{Result, SessionError};
use crate::platform::{HttpClient, HttpResponse};

/// [`HttpClient`] that redirects every request to a fixed gateway address
pub struct DexRewriteClient {
    gateway: Url,
    inner: Arc<dyn HttpClient>,
}

impl DexRewriteClient {
    /// `gateway_addr` may omit the scheme, in which case `http` is assumed.
    pub fn new(gateway_addr: &str, inner: Arc<dyn HttpClient>) -> Result<Self> {
        let with_scheme = if gateway_addr.contains("://") {
            gateway_addr.to_string()
        } else {
            format!("http://{}", gateway_addr)
        };

        let gateway = Url::parse(&with_scheme).map_err(|e| {
            SessionError::configuration(format!("invalid gateway address '{}': {}", gateway_addr, e))
        })?;

        if gateway.host_str().is_none() {
            return Err(SessionError::configuration(format!(
                "gateway address '{}' has no host",
                gateway_addr
            )));
        }

        Ok(Self { gateway, inner })
    }

    /// Point `url` at the gateway
    pub fn rewrite(&self, url: &str) -> Result<String> {
        let mut target = Url::parse(url)
            .map_err(|e| SessionError::provider(format!("invalid provider URL '{}': {}", url, e)))?;

        let rewrite_failed = || SessionError::internal(format!("cannot rewrite URL '{}'", url));

        target
            .set_scheme(self.gateway.scheme())
            .map_err(|_| rewrite_failed())?;
        target
            .set_host(self.gateway.host_str())
            .map_err(|_| rewrite_failed())?;
        target
            .set_port(self.gateway.port())
            .map_err(|_| rewrite_failed())?;

        Ok(target.into())
    }
}

#[async_trait]
impl HttpClient for DexRewriteClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let rewritten = self.rewrite(url)?;
        tracing::trace!(from = %url, to = %rewritten, "rewriting provider request");
        self.inner.get(&rewritten, headers).await
    }
}
