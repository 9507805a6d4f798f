//! Untrusted structural parsing of compact JWTs
//!
//! Nothing returned from here has been authenticated. It exists so the
//! dispatcher can route on `iss` and the local verifier can inspect `alg`
//! before any key material is touched.

use serde::Deserialize;

use crate::claims::Claims;
use crate::error::{Result, SessionError};

/// JOSE header fields the session code looks at
#[derive(Debug, Clone, Deserialize)]
pub struct RawHeader {
    #[serde(default)]
    pub alg: Option<String>,
}

/// Header and claims of a token whose signature has NOT been checked
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub header: RawHeader,
    pub claims: Claims,
}

/// Split and decode a token without verifying its signature.
///
/// Fails with [`SessionError::InvalidToken`] when the token is not three
/// dot-separated base64url segments, when header or payload is not JSON,
/// or when `iss` is missing or empty.
pub fn parse_unverified(token: &str) -> Result<UnverifiedToken> {
    if token.is_empty() {
        return Err(SessionError::invalid_token("token is empty"));
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(SessionError::invalid_token("invalid JWT format"));
    }

    let header_bytes = base64_url_decode(parts[0])?;
    let header: RawHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| SessionError::invalid_token(format!("invalid JWT header: {}", e)))?;

    let payload = base64_url_decode(parts[1])?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|e| SessionError::invalid_token(format!("invalid JWT claims: {}", e)))?;

    if claims.iss.is_empty() {
        return Err(SessionError::invalid_token("issuer cannot be empty"));
    }

    Ok(UnverifiedToken { header, claims })
}

/// Base64 URL decode
fn base64_url_decode(input: &str) -> Result<Vec<u8>> {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    URL_SAFE_NO_PAD
        .decode(input)
        .or_else(|_| {
            use base64::engine::general_purpose::URL_SAFE;
            URL_SAFE.decode(input)
        })
        .map_err(|e| SessionError::invalid_token(format!("invalid base64: {}", e)))
}
