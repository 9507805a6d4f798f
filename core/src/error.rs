//! Error types and HTTP response mapping

use serde::Serialize;
use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Message shown to end users for every credential failure. The precise
/// cause is only ever written to the logs.
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Session error with HTTP status code mapping
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("invalid token: {message}")]
    InvalidToken { message: String },

    #[error("unexpected signing algorithm: {message}")]
    AlgorithmMismatch { message: String },

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token expired: {message}")]
    TokenExpired { message: String },

    #[error("credentials for the local account changed since token was issued")]
    CredentialsRotated,

    #[error("provider rejected token: {message}")]
    Provider { message: String },

    #[error("provider unavailable: {message}")]
    Upstream { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("invalid username or password")]
    InvalidLogin,

    #[error("blank passwords are not allowed")]
    BlankPassword,
}

impl SessionError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    pub fn algorithm_mismatch(message: impl Into<String>) -> Self {
        Self::AlgorithmMismatch {
            message: message.into(),
        }
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::TokenExpired {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a retry of the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } => 400,
            Self::Configuration { .. } | Self::Internal { .. } => 500,
            _ => 401,
        }
    }

    /// Get the error key for this error
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Configuration { .. } | Self::Internal { .. } => "internal_error",
            _ => "unauthenticated",
        }
    }

    /// Message safe to show to end users.
    ///
    /// Every token and login failure collapses to the same text so a caller
    /// cannot tell which check rejected them.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidRequest { .. } => self.to_string(),
            Self::Configuration { .. } | Self::Internal { .. } => "internal error".to_string(),
            Self::BlankPassword => self.to_string(),
            _ => INVALID_CREDENTIALS.to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&SessionError> for ErrorResponse {
    fn from(err: &SessionError) -> Self {
        Self {
            error: err.error_key().to_string(),
            message: err.public_message(),
        }
    }
}
