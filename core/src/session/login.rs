//! Username/password login for the built-in superuser

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::SessionManager;
use crate::error::{Result, SessionError};

type HmacSha256 = Hmac<Sha256>;

impl SessionManager {
    /// Check credentials of the local superuser.
    ///
    /// Unknown users and wrong passwords fail with the same error.
    pub fn verify_username_password(&self, username: &str, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(SessionError::BlankPassword);
        }

        let Some(account) = self.settings.local_account.as_ref() else {
            tracing::warn!(username, "login attempted but no local account is configured");
            return Err(SessionError::InvalidLogin);
        };

        // Compare MACs so the check does not leak the matching prefix length
        let expected = self.password_mac(&account.password)?.finalize().into_bytes();
        let password_ok = self.password_mac(password)?.verify_slice(&expected).is_ok();

        if username != account.username || !password_ok {
            tracing::warn!(username, "invalid login");
            return Err(SessionError::InvalidLogin);
        }

        Ok(())
    }

    /// Verify credentials and mint a token for `username`
    pub fn login(&self, username: &str, password: &str, seconds_before_expiry: i64) -> Result<String> {
        self.verify_username_password(username, password)?;
        self.create(username, seconds_before_expiry)
    }

    fn password_mac(&self, password: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.settings.server_secret.as_bytes())
            .map_err(|_| SessionError::internal("failed to create HMAC"))?;
        mac.update(password.as_bytes());
        Ok(mac)
    }
}
