//! OIDC (OpenID Connect) module
//!
//! The external trust source: discovery, JWKS fetching, signature
//! verification and the gateway rewrite layer used to reach the provider.

mod discovery;
mod jwks;
mod provider;
mod rewrite;

pub use provider::{IdToken, OidcProvider, Provider};
pub use rewrite::DexRewriteClient;
