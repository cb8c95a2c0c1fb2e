//! Firebase Auth sign-in with a custom token (REST)
//!
//! `POST {endpoint}/accounts:signInWithCustomToken?key={api_key}` with
//! `{"token": ..., "returnSecureToken": true}`. The returned ID token is the
//! downstream session. Error messages such as `INVALID_CUSTOM_TOKEN` are
//! mapped to SDK-style codes (`auth/invalid-custom-token`).

use std::sync::Mutex;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{BoxFuture, DownstreamAuth, DownstreamError};

pub const DEFAULT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Code reported when the backend could not be reached at all.
pub const NETWORK_REQUEST_FAILED: &str = "auth/network-request-failed";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    token: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct FirebaseAuth {
    client: reqwest::Client,
    endpoint: String,
    api_key: Secret<String>,
    /// ID token of the current downstream session.
    session: Mutex<Option<Secret<String>>>,
}

impl FirebaseAuth {
    pub fn new(client: reqwest::Client, api_key: Secret<String>) -> Self {
        Self::with_endpoint(client, DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: &str, api_key: Secret<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            session: Mutex::new(None),
        }
    }

    /// ID token of the current session, for calls against the backend.
    pub fn id_token(&self) -> Option<Secret<String>> {
        self.lock_session().clone()
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Secret<String>>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<(), DownstreamError> {
        let url = format!(
            "{}/accounts:signInWithCustomToken?key={}",
            self.endpoint,
            self.api_key.expose_str()
        );
        let response = self
            .client
            .post(&url)
            .json(&SignInRequest {
                token,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| {
                DownstreamError::new(NETWORK_REQUEST_FAILED, e.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("sign-in returned {status}"));
            return Err(DownstreamError::new(error_code(&message), message));
        }

        let signed_in = response.json::<SignInResponse>().await.map_err(|e| {
            DownstreamError::new("auth/internal-error", format!("invalid sign-in response: {e}"))
        })?;
        debug!(expires_in = ?signed_in.expires_in, "downstream ID token issued");

        *self.lock_session() = Some(Secret::new(signed_in.id_token));
        info!("signed in to downstream backend");
        Ok(())
    }
}

/// `INVALID_CUSTOM_TOKEN : detail` → `auth/invalid-custom-token`.
fn error_code(message: &str) -> String {
    let reason = message.split(" : ").next().unwrap_or(message).trim();
    format!("auth/{}", reason.to_ascii_lowercase().replace('_', "-"))
}

impl DownstreamAuth for FirebaseAuth {
    fn sign_in<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), DownstreamError>> {
        Box::pin(self.sign_in_with_custom_token(token))
    }

    fn sign_out(&self) {
        if self.lock_session().take().is_some() {
            info!("signed out of downstream backend");
        }
    }

    fn is_signed_in(&self) -> bool {
        self.lock_session().is_some()
    }
}
