//! Minting endpoint client
//!
//! One GET to `<api_root>/auth/firebase` carrying the provider access token
//! as a Bearer credential. Success body is `{"firebaseToken": "..."}`.

use std::time::Duration;

use tracing::debug;

use crate::{BoxFuture, ExchangeError, MintedToken, TokenExchange};

/// Path of the minting route under the API root.
pub const MINT_PATH: &str = "auth/firebase";

pub struct HttpTokenExchange {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTokenExchange {
    /// `api_root` may or may not end with `/`.
    pub fn new(client: reqwest::Client, api_root: &str, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: format!("{}/{MINT_PATH}", api_root.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn mint(&self, access_token: &str) -> Result<MintedToken, ExchangeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token = response
            .json::<MintedToken>()
            .await
            .map_err(|e| match self.transport_error(e) {
                ExchangeError::Http(msg) => ExchangeError::InvalidResponse(msg),
                other => other,
            })?;
        debug!(endpoint = %self.endpoint, "minted downstream token");
        Ok(token)
    }

    fn transport_error(&self, e: reqwest::Error) -> ExchangeError {
        if e.is_timeout() {
            ExchangeError::NetworkTimeout(self.timeout)
        } else {
            ExchangeError::Http(e.to_string())
        }
    }
}

impl TokenExchange for HttpTokenExchange {
    fn exchange<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<MintedToken, ExchangeError>> {
        Box::pin(self.mint(access_token))
    }
}
