//! Profile lookup against the provider's userinfo endpoint

use tracing::debug;

use crate::error::ProviderError;
use crate::types::Profile;

/// Fetch the profile for an access token.
///
/// 401/403 means the token was rejected; any other failure is reported as
/// `request_error` with the status and body for context.
pub async fn fetch_profile(
    client: &reqwest::Client,
    endpoint: &str,
    access_token: &str,
) -> Result<Profile, ProviderError> {
    let response = client
        .get(endpoint)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| {
            ProviderError::new(
                ProviderError::REQUEST_ERROR,
                format!("userinfo request failed: {e}"),
            )
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::new(
                ProviderError::UNAUTHORIZED,
                format!("access token rejected ({status}): {body}"),
            ));
        }

        return Err(ProviderError::new(
            ProviderError::REQUEST_ERROR,
            format!("userinfo returned {status}: {body}"),
        ));
    }

    let profile = response.json::<Profile>().await.map_err(|e| {
        ProviderError::new(
            ProviderError::REQUEST_ERROR,
            format!("invalid userinfo response: {e}"),
        )
    })?;
    debug!(sub = ?profile.sub, "fetched user profile");
    Ok(profile)
}
