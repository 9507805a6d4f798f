//! Routing of bearer tokens to the verifier of their trust source

use super::SessionManager;
use crate::claims::Claims;
use crate::error::{Result, SessionError};
use crate::token::parse_unverified;

impl SessionManager {
    /// Verify a token issued either by this manager or by the identity
    /// provider.
    ///
    /// The issuer is read from an unverified parse and only decides which
    /// verifier runs. Authorization relies solely on the result of that
    /// verifier.
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let unverified = parse_unverified(token).inspect_err(|e| {
            tracing::warn!(error = %e, "rejecting malformed token");
        })?;

        let result = if unverified.claims.iss == self.settings.issuer {
            tracing::debug!("verifying locally issued token");
            self.parse(token)
        } else {
            tracing::debug!(iss = %unverified.claims.iss, "verifying provider issued token");
            match unverified.claims.aud.first() {
                Some(audience) => self.verify_external(audience, token).await,
                None => Err(SessionError::invalid_token("token has no audience")),
            }
        };

        result.inspect_err(|e| {
            tracing::warn!(error = %e, iss = %unverified.claims.iss, "token verification failed");
        })
    }

    /// Verify a provider issued token for `audience`
    pub async fn verify_external(&self, audience: &str, token: &str) -> Result<Claims> {
        let provider = self.provider()?;
        let id_token = provider.verify(audience, token).await?;
        id_token.claims::<Claims>()
    }
}
