//! OIDC Discovery document fetching
//!
//! Fetches and parses OpenID Connect discovery documents.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::platform::HttpClient;

/// OIDC Discovery document (partial)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// Fetch OIDC discovery document for an issuer
pub async fn fetch_discovery(issuer: &str, http: &dyn HttpClient) -> Result<DiscoveryDocument> {
    let discovery_url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));

    let response = http
        .get(
            &discovery_url,
            &[
                ("Accept", "application/json"),
                ("User-Agent", "argocd-session"),
            ],
        )
        .await
        .map_err(|e| SessionError::upstream(format!("failed to fetch discovery document: {}", e)))?;

    if response.status != 200 {
        return Err(SessionError::upstream(format!(
            "failed to fetch discovery document: HTTP {}",
            response.status
        )));
    }

    let doc: DiscoveryDocument = response
        .json()
        .map_err(|e| SessionError::provider(format!("invalid discovery document: {}", e)))?;

    // Verify issuer matches
    if doc.issuer != issuer && doc.issuer != issuer.trim_end_matches('/') {
        return Err(SessionError::provider(format!(
            "issuer mismatch: expected '{}', got '{}'",
            issuer, doc.issuer
        )));
    }

    Ok(doc)
}

/// Validate issuer URL format per RFC 8414 and OpenID Connect Core 1.0
pub(crate) fn validate_issuer_url(issuer: &str) -> Result<()> {
    let url = url::Url::parse(issuer)
        .map_err(|_| SessionError::configuration("invalid OIDC issuer URL"))?;

    let is_localhost = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"));
    if url.scheme() != "https" && !is_localhost {
        return Err(SessionError::configuration("OIDC issuer must use HTTPS"));
    }

    if url.query().is_some() {
        return Err(SessionError::configuration("OIDC issuer URL must not have query string"));
    }

    if url.fragment().is_some() {
        return Err(SessionError::configuration("OIDC issuer URL must not have fragment"));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(SessionError::configuration("OIDC issuer URL must not have userinfo"));
    }

    // Parsing converts IDN hosts to punycode, so look at the raw authority
    let authority = issuer
        .split_once("://")
        .and_then(|(_, rest)| rest.split(['/', '?', '#']).next())
        .unwrap_or("");
    if !authority.is_ascii() {
        return Err(SessionError::configuration(
            "OIDC issuer hostname contains non-ASCII characters",
        ));
    }

    Ok(())
}
