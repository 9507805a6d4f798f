//! Minting of local session tokens

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use super::SessionManager;
use crate::claims::Claims;
use crate::error::{Result, SessionError};

impl SessionManager {
    /// Create a signed token for `subject`.
    ///
    /// A `seconds_before_expiry` of zero or less creates a token that never
    /// expires.
    pub fn create(&self, subject: &str, seconds_before_expiry: i64) -> Result<String> {
        let now = self.now_secs();

        let mut claims = Claims::new(self.settings.issuer.as_str(), subject);
        claims.iat = Some(now);
        claims.nbf = Some(now);
        if seconds_before_expiry > 0 {
            let exp = now
                .checked_add(seconds_before_expiry)
                .ok_or_else(|| SessionError::configuration("token expiry out of range"))?;
            claims.exp = Some(exp);
        }

        self.sign_claims(&claims)
    }

    fn sign_claims(&self, claims: &Claims) -> Result<String> {
        tracing::info!(
            iss = %claims.iss,
            sub = %claims.sub,
            iat = ?claims.iat,
            exp = ?claims.exp,
            "issuing claims"
        );

        let key = EncodingKey::from_secret(self.settings.server_secret.as_bytes());

        encode(&Header::new(Algorithm::HS256), claims, &key)
            .map_err(|e| SessionError::configuration(format!("failed to sign token: {}", e)))
    }
}
