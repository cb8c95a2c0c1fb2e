//! Error types for identity-provider and credential storage operations

/// Error reported by, or on behalf of, the identity provider.
///
/// `code` carries the provider's error code (`access_denied`,
/// `login_required`, ...) when it supplied one, or one of the adapter's own
/// codes below when the callback data itself was unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    /// No credential in the fragment, or one that could not be decoded.
    pub const INVALID_HASH: &'static str = "invalid_hash";
    /// Fragment `state` does not match the authorization this client started.
    pub const INVALID_STATE: &'static str = "invalid_state";
    /// The provider rejected the access token (401/403 from userinfo).
    pub const UNAUTHORIZED: &'static str = "unauthorized";
    /// Transport failure or unexpected response from the provider.
    pub const REQUEST_ERROR: &'static str = "request_error";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Errors from credential store I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;
