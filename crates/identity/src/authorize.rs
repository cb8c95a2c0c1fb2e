//! Hosted-login authorization request
//!
//! Builds the implicit-flow URL that sends the browser to the provider's
//! login page. The provider returns the credential in the URL fragment
//! (`response_type=token`), so there is no code exchange step. `state` ties
//! the callback to this request; `nonce` binds any ID token to it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use url::form_urlencoded;

use crate::config::ProviderConfig;

/// Fixed response mode: token delivered in the fragment.
pub const RESPONSE_TYPE: &str = "token";

/// Opaque anti-forgery value echoed back by the provider.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().as_simple().to_string()
}

/// 32 random bytes, URL-safe base64 without padding (43 chars).
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL. Parameter values are percent-encoded.
pub fn build_authorization_url(config: &ProviderConfig, state: &str, nonce: &str) -> String {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("response_type", RESPONSE_TYPE),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("audience", config.audience.as_str()),
        ("scope", config.scope.as_str()),
        ("state", state),
        ("nonce", nonce),
    ];
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{}?{query}", config.authorize_endpoint())
}
