//! Provider credential and user profile records

use serde::{Deserialize, Serialize};

/// Credential returned in the callback fragment.
///
/// This is the raw blob persisted under `authResult`. `issued_at` is a unix
/// timestamp in milliseconds taken when the fragment was parsed; together
/// with `expires_in` (seconds delta) it fixes the absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub issued_at: u64,
}

impl Credential {
    /// Absolute expiry as unix millis: `issued_at + expires_in * 1000`.
    pub fn expires_at(&self) -> u64 {
        self.issued_at
            .saturating_add(self.expires_in.saturating_mul(1000))
    }
}

/// User profile from the provider's userinfo endpoint.
///
/// Standard OIDC claims are typed; anything else the tenant adds is kept in
/// `extra` so it survives a round trip to the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
