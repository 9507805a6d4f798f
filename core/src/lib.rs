//! argocd-session-core: Platform-agnostic session token logic
//!
//! Issues tokens for the built-in superuser and verifies bearer tokens from
//! two trust sources: locally minted HMAC tokens and ID tokens from an
//! external OIDC provider. It depends only on abstract platform traits
//! (Cache, HttpClient, Clock, Environment) and never imports
//! platform-specific code.

pub mod claims;
pub mod config;
pub mod error;
pub mod oidc;
pub mod platform;
pub mod session;
pub mod token;

pub use claims::{display_name, get_field, Claims};
pub use error::{Result, SessionError};
pub use session::SessionManager;

#[cfg(test)]
pub mod test_support;
