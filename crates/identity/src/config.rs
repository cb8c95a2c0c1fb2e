//! Identity-provider client configuration
//!
//! Every field is required and has no default. The service layer validates
//! the values before constructing a client.

use serde::Deserialize;

/// Static configuration for the hosted-login tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Public client (application) ID
    pub client_id: String,
    /// Tenant domain without scheme, e.g. `tenant.eu.auth0.com`
    pub domain: String,
    /// Where the provider sends the browser back with the credential fragment
    pub redirect_uri: String,
    /// API identifier the access token is minted for
    pub audience: String,
    /// Space-separated scopes
    pub scope: String,
}

impl ProviderConfig {
    /// Hosted login page.
    pub fn authorize_endpoint(&self) -> String {
        format!("https://{}/authorize", self.domain)
    }

    /// Profile lookup for an access token.
    pub fn userinfo_endpoint(&self) -> String {
        format!("https://{}/userinfo", self.domain)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ProviderConfig {
    ProviderConfig {
        client_id: "c1ient-id".into(),
        domain: "tenant.auth0.example".into(),
        redirect_uri: "http://localhost:4200/callback".into(),
        audience: "https://api.example.com/".into(),
        scope: "openid profile email".into(),
    }
}
