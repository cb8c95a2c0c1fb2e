//! Downstream credential minting and sign-in
//!
//! Two seams sit between the session coordinator and the real-time backend:
//! - `TokenExchange` presents the provider access token to a trusted endpoint
//!   and gets a minted custom token back (`HttpTokenExchange`)
//! - `DownstreamAuth` signs in to the backend with that token
//!   (`FirebaseAuth`, REST `accounts:signInWithCustomToken`)

pub mod exchange;
pub mod firebase;

pub use exchange::HttpTokenExchange;
pub use firebase::FirebaseAuth;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future used by the dyn-compatible traits below.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Payload returned by the minting endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintedToken {
    pub firebase_token: String,
}

/// Failure to obtain a minted token.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExchangeError {
    #[error("token exchange request failed: {0}")]
    Http(String),

    #[error("minting endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid minting response: {0}")]
    InvalidResponse(String),

    #[error("token exchange timed out after {0:?}")]
    NetworkTimeout(Duration),
}

impl ExchangeError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::NetworkTimeout(_) => "timeout",
            _ => "error",
        }
    }
}

/// Downstream sign-in rejected the minted token.
///
/// `code` uses the backend SDK's `auth/...` codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct DownstreamError {
    pub code: String,
    pub message: String,
}

impl DownstreamError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Mints a downstream token from a provider access token.
pub trait TokenExchange: Send + Sync {
    /// One cancellable call; dropping the future aborts the request.
    fn exchange<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<MintedToken, ExchangeError>>;
}

/// Sign-in boundary of the real-time backend.
pub trait DownstreamAuth: Send + Sync {
    fn sign_in<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), DownstreamError>>;

    /// Fire-and-forget; clears the local downstream session.
    fn sign_out(&self);

    /// Whether a downstream session is currently held.
    fn is_signed_in(&self) -> bool;
}
