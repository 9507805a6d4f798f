//! Verification of locally minted tokens

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::SessionManager;
use crate::claims::Claims;
use crate::config::CLOCK_SKEW_LEEWAY_SECS;
use crate::error::{Result, SessionError};
use crate::token::parse_unverified;

/// HMAC algorithms accepted for local tokens
const LOCAL_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

impl SessionManager {
    /// Verify a token minted by this manager and return its claims.
    pub fn parse(&self, token: &str) -> Result<Claims> {
        let unverified = parse_unverified(token)?;

        // The declared algorithm must be HMAC before the secret is used at all
        let alg = unverified.header.alg.as_deref().unwrap_or("");
        if !matches!(alg, "HS256" | "HS384" | "HS512") {
            return Err(SessionError::algorithm_mismatch(format!(
                "unexpected signing method: {:?}",
                unverified.header.alg
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = LOCAL_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_required_spec_claims(&["iss", "sub"]);

        let key = DecodingKey::from_secret(self.settings.server_secret.as_bytes());
        let token_data = decode::<Claims>(token, &key, &validation).map_err(map_jwt_error)?;
        let claims = token_data.claims;

        self.check_time_claims(&claims)?;
        self.check_credentials_rotation(&claims)?;

        Ok(claims)
    }

    fn check_time_claims(&self, claims: &Claims) -> Result<()> {
        let now = self.now_secs();

        if let Some(exp) = claims.exp {
            if exp <= now {
                return Err(SessionError::token_expired("token has expired"));
            }
        }

        if let Some(nbf) = claims.nbf {
            if nbf > now + CLOCK_SKEW_LEEWAY_SECS as i64 {
                return Err(SessionError::token_expired("token is not yet valid (nbf claim)"));
            }
        }

        Ok(())
    }

    fn check_credentials_rotation(&self, claims: &Claims) -> Result<()> {
        let Some(changed_at) = self.settings.credentials_changed_at else {
            return Ok(());
        };

        match claims.iat {
            Some(iat) if iat >= changed_at => Ok(()),
            _ => Err(SessionError::CredentialsRotated),
        }
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> SessionError {
    match err.kind() {
        ErrorKind::InvalidSignature => SessionError::SignatureInvalid,
        ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm | ErrorKind::InvalidAlgorithmName => {
            SessionError::algorithm_mismatch(err.to_string())
        }
        ErrorKind::InvalidKeyFormat => SessionError::configuration(format!("invalid signing key: {}", err)),
        ErrorKind::InvalidIssuer => SessionError::invalid_token("issuer mismatch"),
        _ => SessionError::invalid_token(err.to_string()),
    }
}
