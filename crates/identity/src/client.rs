//! Auth0 implementation of `IdentityProvider`

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::authorize::{build_authorization_url, generate_nonce, generate_state};
use crate::callback::parse_fragment;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{Credential, Profile, now_millis};
use crate::userinfo::fetch_profile;
use crate::IdentityProvider;

/// Authorization started by this client and not yet returned.
struct PendingAuthorization {
    state: String,
    nonce: String,
}

/// Hosted-login client for an Auth0 tenant.
///
/// Holds the pending authorization in memory; a process restart between
/// redirect and callback drops it, and the callback is then accepted without
/// a state check.
pub struct Auth0Client {
    config: ProviderConfig,
    http_client: reqwest::Client,
    userinfo_endpoint: String,
    pending: Mutex<Option<PendingAuthorization>>,
}

impl Auth0Client {
    pub fn new(config: ProviderConfig, http_client: reqwest::Client) -> Self {
        let userinfo_endpoint = config.userinfo_endpoint();
        Self {
            config,
            http_client,
            userinfo_endpoint,
            pending: Mutex::new(None),
        }
    }

    /// Override the userinfo endpoint (the tenant default is
    /// `https://{domain}/userinfo`).
    #[must_use]
    pub fn with_userinfo_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.userinfo_endpoint = endpoint.into();
        self
    }

    /// Nonce of the pending authorization, if any.
    pub fn pending_nonce(&self) -> Option<String> {
        self.lock_pending().as_ref().map(|p| p.nonce.clone())
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<PendingAuthorization>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdentityProvider for Auth0Client {
    fn initiate_authorization(&self) -> String {
        let state = generate_state();
        let nonce = generate_nonce();
        let url = build_authorization_url(&self.config, &state, &nonce);

        let replaced = self
            .lock_pending()
            .replace(PendingAuthorization { state, nonce });
        if replaced.is_some() {
            debug!("superseded a pending authorization");
        }
        info!(domain = %self.config.domain, "authorization initiated");
        url
    }

    fn parse_callback(&self, fragment: &str) -> Result<Credential, ProviderError> {
        // Each pending state is good for exactly one callback.
        let pending = self.lock_pending().take();
        let expected = pending.as_ref().map(|p| p.state.as_str());
        if expected.is_none() {
            warn!("callback without a pending authorization, state not checked");
        }
        parse_fragment(fragment, expected, now_millis())
    }

    fn fetch_user_info<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Profile, ProviderError>> + Send + 'a>> {
        Box::pin(fetch_profile(
            &self.http_client,
            &self.userinfo_endpoint,
            access_token,
        ))
    }
}
