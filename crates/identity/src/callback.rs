//! Callback fragment parsing
//!
//! The provider redirects back to `redirect_uri` with either
//! `#access_token=...&expires_in=...&token_type=Bearer&state=...` or
//! `#error=access_denied&error_description=...&state=...`.

use std::collections::HashMap;

use crate::error::ProviderError;
use crate::types::Credential;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: u64 = 7200;

/// Parse a callback fragment into a credential.
///
/// `expected_state` is the state of the authorization this client started,
/// if any. When present, the fragment must echo it. `issued_at` (unix millis)
/// is stamped on the credential.
pub fn parse_fragment(
    fragment: &str,
    expected_state: Option<&str>,
    issued_at: u64,
) -> Result<Credential, ProviderError> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let params: HashMap<String, String> = url::form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect();

    let state = params.get("state").cloned();
    if let Some(expected) = expected_state
        && state.as_deref() != Some(expected)
    {
        return Err(ProviderError::new(
            ProviderError::INVALID_STATE,
            "`state` does not match the pending authorization",
        ));
    }

    if let Some(code) = params.get("error") {
        return Err(ProviderError::new(
            code.clone(),
            params
                .get("error_description")
                .cloned()
                .unwrap_or_else(|| code.clone()),
        ));
    }

    let access_token = match params.get("access_token") {
        Some(token) if !token.is_empty() => token.clone(),
        _ => {
            return Err(ProviderError::new(
                ProviderError::INVALID_HASH,
                "no credential in callback fragment",
            ));
        }
    };

    let expires_in = match params.get("expires_in") {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ProviderError::new(
                ProviderError::INVALID_HASH,
                format!("invalid expires_in: {raw}"),
            )
        })?,
        None => DEFAULT_EXPIRES_IN,
    };

    Ok(Credential {
        access_token,
        expires_in,
        token_type: params.get("token_type").cloned(),
        id_token: params.get("id_token").cloned(),
        scope: params.get("scope").cloned(),
        state,
        issued_at,
    })
}
