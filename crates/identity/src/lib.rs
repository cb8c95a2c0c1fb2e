//! Identity-provider client and credential storage
//!
//! Login flow on the provider side:
//! 1. `IdentityProvider::initiate_authorization()` builds the hosted-login URL
//!    (implicit flow, token in fragment) and records the pending `state`
//! 2. The provider redirects back with a fragment;
//!    `IdentityProvider::parse_callback()` turns it into a `Credential`
//! 3. `IdentityProvider::fetch_user_info()` resolves the `Profile`
//! 4. The credential, its expiry and the post-login route live in
//!    `CredentialStore` under fixed keys

pub mod authorize;
pub mod callback;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod types;
pub mod userinfo;

pub use client::Auth0Client;
pub use config::ProviderConfig;
pub use credentials::{
    AUTH_RESULT_KEY, CredentialStore, EXPIRES_AT_KEY, REDIRECT_KEY, SESSION_KEYS,
};
pub use error::{Error, ProviderError, Result};
pub use types::{Credential, Profile, now_millis};

use std::future::Future;
use std::pin::Pin;

/// Boundary to the external identity provider.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn IdentityProvider>`).
pub trait IdentityProvider: Send + Sync {
    /// Build the hosted-login URL for a fresh authorization. The caller
    /// performs the navigation; control does not come back until the
    /// provider redirects to the callback.
    fn initiate_authorization(&self) -> String;

    /// Turn the callback fragment into a credential, or the provider's error.
    fn parse_callback(&self, fragment: &str) -> std::result::Result<Credential, ProviderError>;

    /// Look up the profile for an access token.
    fn fetch_user_info<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Profile, ProviderError>> + Send + 'a>>;
}
