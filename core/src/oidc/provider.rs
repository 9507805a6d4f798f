//! OIDC token verification against a provider's published keys

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::discovery::{fetch_discovery, validate_issuer_url, DiscoveryDocument};
use super::jwks::{fetch_jwks, select_key};
use crate::claims::numeric_date;
use crate::config::{CLOCK_SKEW_LEEWAY_SECS, DISCOVERY_CACHE_TTL_SECS, JWKS_CACHE_TTL_SECS};
use crate::error::{Result, SessionError};
use crate::platform::{cache_get, cache_put, Cache, Clock, HttpClient};

/// Verifies tokens minted by an external identity provider
#[async_trait]
pub trait Provider: Send + Sync {
    /// Check signature, expiry, issuer and that `audience` is among the
    /// token's audiences.
    async fn verify(&self, audience: &str, token: &str) -> Result<IdToken>;
}

/// A token the provider has vouched for
#[derive(Debug, Clone)]
pub struct IdToken {
    claims: serde_json::Value,
}

impl IdToken {
    pub fn new(claims: serde_json::Value) -> Self {
        Self { claims }
    }

    /// Decode the verified claims into `T`
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.claims.clone())
            .map_err(|e| SessionError::provider(format!("invalid ID token claims: {}", e)))
    }
}

/// [`Provider`] backed by OIDC discovery and the provider's JWKS
pub struct OidcProvider {
    issuer: String,
    http: Arc<dyn HttpClient>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl OidcProvider {
    /// Construction performs no I/O; discovery happens on first verify.
    pub fn new(
        issuer: &str,
        http: Arc<dyn HttpClient>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        validate_issuer_url(issuer)?;

        Ok(Self {
            issuer: issuer.to_string(),
            http,
            cache,
            clock,
        })
    }

    async fn discovery(&self) -> Result<DiscoveryDocument> {
        let cache_key = format!("oidc:discovery:{}", self.issuer);

        if let Ok(Some(doc)) = cache_get::<DiscoveryDocument>(self.cache.as_ref(), &cache_key).await {
            return Ok(doc);
        }

        let doc = fetch_discovery(&self.issuer, self.http.as_ref()).await?;
        let _ = cache_put(self.cache.as_ref(), &cache_key, &doc, DISCOVERY_CACHE_TTL_SECS).await;

        Ok(doc)
    }

    async fn signing_keys(&self, jwks_uri: &str, refresh: bool) -> Result<JwkSet> {
        let cache_key = format!("oidc:jwks:{}", jwks_uri);

        if !refresh {
            if let Ok(Some(jwks)) = cache_get::<JwkSet>(self.cache.as_ref(), &cache_key).await {
                return Ok(jwks);
            }
        }

        let jwks = fetch_jwks(jwks_uri, self.http.as_ref()).await?;
        let _ = cache_put(self.cache.as_ref(), &cache_key, &jwks, JWKS_CACHE_TTL_SECS).await;

        Ok(jwks)
    }

    /// Key for `kid`, refetching once in case the provider rotated keys
    async fn decoding_key(&self, jwks_uri: &str, kid: &str, alg: Algorithm) -> Result<DecodingKey> {
        let cached = self.signing_keys(jwks_uri, false).await?;
        if cached.find(kid).is_some() {
            return select_key(&cached, kid, alg);
        }

        tracing::debug!(kid, "signing key not cached, refreshing JWKS");
        let refreshed = self.signing_keys(jwks_uri, true).await?;
        select_key(&refreshed, kid, alg)
    }
}

#[async_trait]
impl Provider for OidcProvider {
    async fn verify(&self, audience: &str, token: &str) -> Result<IdToken> {
        let header = decode_header(token)
            .map_err(|e| SessionError::provider(format!("invalid JWT header: {}", e)))?;

        if matches!(header.alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(SessionError::provider(format!(
                "symmetric algorithm {:?} not accepted for provider tokens",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| SessionError::provider("JWT missing 'kid' header"))?;

        let discovery = self.discovery().await?;

        let alg_name = format!("{:?}", header.alg);
        if !discovery.id_token_signing_alg_values_supported.is_empty()
            && !discovery.id_token_signing_alg_values_supported.contains(&alg_name)
        {
            return Err(SessionError::provider(format!(
                "algorithm {} not advertised by provider",
                alg_name
            )));
        }

        let decoding_key = self.decoding_key(&discovery.jwks_uri, kid, header.alg).await?;

        // Time-based claims are checked against the injected clock below,
        // which also accepts fractional NumericDates
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["iss", "aud"]);

        let token_data = decode::<serde_json::Value>(token, &decoding_key, &validation)
            .map_err(|e| SessionError::provider(format!("token verification failed: {}", e)))?;

        let now_secs = self.clock.now_secs() as i64;

        let exp = token_data
            .claims
            .get("exp")
            .and_then(numeric_date)
            .ok_or_else(|| SessionError::provider("token has no numeric 'exp' claim"))?;
        if exp <= now_secs {
            return Err(SessionError::provider("token has expired"));
        }

        if let Some(nbf) = token_data.claims.get("nbf").and_then(numeric_date) {
            if nbf > now_secs + CLOCK_SKEW_LEEWAY_SECS as i64 {
                return Err(SessionError::provider("token is not yet valid (nbf claim)"));
            }
        }

        Ok(IdToken::new(token_data.claims))
    }
}
