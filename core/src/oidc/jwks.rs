//! Provider signing keys
//!
//! Fetching the JWKS document and picking the key that may verify a token.

use jsonwebtoken::jwk::{JwkSet, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};

use crate::error::{Result, SessionError};
use crate::platform::HttpClient;

pub async fn fetch_jwks(jwks_uri: &str, http: &dyn HttpClient) -> Result<JwkSet> {
    let response = http
        .get(jwks_uri, &[("Accept", "application/json"), ("User-Agent", "argocd-session")])
        .await
        .map_err(|e| SessionError::upstream(format!("failed to fetch JWKS: {}", e)))?;

    match response.status {
        200 => response
            .json::<JwkSet>()
            .map_err(|e| SessionError::provider(format!("invalid JWKS: {}", e))),
        status => Err(SessionError::upstream(format!("JWKS endpoint answered HTTP {}", status))),
    }
}

/// Key for `kid`, usable for signatures made with `alg`.
///
/// A key that declares an algorithm or an encryption use cannot be borrowed
/// for a different purpose.
pub fn select_key(jwks: &JwkSet, kid: &str, alg: Algorithm) -> Result<DecodingKey> {
    let jwk = jwks
        .find(kid)
        .ok_or_else(|| SessionError::provider(format!("key '{}' not found in JWKS", kid)))?;

    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return Err(SessionError::provider(format!("key '{}' is an encryption key", kid)));
    }

    if let Some(key_alg) = &jwk.common.key_algorithm {
        if format!("{:?}", key_alg) != format!("{:?}", alg) {
            return Err(SessionError::provider(format!(
                "key '{}' is for {:?}, token uses {:?}",
                kid, key_alg, alg
            )));
        }
    }

    DecodingKey::from_jwk(jwk).map_err(|e| SessionError::provider(format!("invalid JWK: {}", e)))
}
