//! In-memory collaborators for coordinator tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use downstream::{
    BoxFuture, DownstreamAuth, DownstreamError, ExchangeError, MintedToken, TokenExchange,
};
use identity::{Credential, IdentityProvider, Profile, ProviderError};
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::navigation::Navigator;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}

pub(crate) struct FakeProvider {
    callback: Mutex<Result<Credential, ProviderError>>,
    profile: Mutex<Result<Profile, ProviderError>>,
    authorize_calls: AtomicUsize,
    userinfo_tokens: Mutex<Vec<String>>,
    profile_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeProvider {
    pub(crate) const AUTHORIZE_URL: &'static str =
        "https://tenant.auth0.example/authorize?response_type=token";

    pub(crate) fn new() -> Self {
        Self {
            callback: Mutex::new(Err(ProviderError::new(ProviderError::INVALID_HASH, "unset"))),
            profile: Mutex::new(Err(ProviderError::new(ProviderError::REQUEST_ERROR, "unset"))),
            authorize_calls: AtomicUsize::new(0),
            userinfo_tokens: Mutex::new(Vec::new()),
            profile_gate: Mutex::new(None),
        }
    }

    pub(crate) fn set_callback(&self, result: Result<Credential, ProviderError>) {
        *lock(&self.callback) = result;
    }

    pub(crate) fn set_profile(&self, result: Result<Profile, ProviderError>) {
        *lock(&self.profile) = result;
    }

    /// Make profile lookups wait until the returned `Notify` fires.
    pub(crate) fn hold_profile(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *lock(&self.profile_gate) = Some(notify.clone());
        notify
    }

    pub(crate) fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn userinfo_tokens(&self) -> Vec<String> {
        lock(&self.userinfo_tokens).clone()
    }
}

impl IdentityProvider for FakeProvider {
    fn initiate_authorization(&self) -> String {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        Self::AUTHORIZE_URL.to_string()
    }

    fn parse_callback(&self, _fragment: &str) -> Result<Credential, ProviderError> {
        lock(&self.callback).clone()
    }

    fn fetch_user_info<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Profile, ProviderError>> {
        lock(&self.userinfo_tokens).push(access_token.to_string());
        let gate = lock(&self.profile_gate).clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            lock(&self.profile).clone()
        })
    }
}

pub(crate) struct FakeExchange {
    calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
    failure: Mutex<Option<ExchangeError>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeExchange {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }

    pub(crate) fn fail_with(&self, error: ExchangeError) {
        *lock(&self.failure) = Some(error);
    }

    /// Make exchanges wait until the returned `Notify` fires.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *lock(&self.gate) = Some(notify.clone());
        notify
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn tokens_seen(&self) -> Vec<String> {
        lock(&self.tokens_seen).clone()
    }
}

impl TokenExchange for FakeExchange {
    /// Mints `minted-<n>` for the n-th call.
    fn exchange<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<MintedToken, ExchangeError>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.tokens_seen).push(access_token.to_string());
        let gate = lock(&self.gate).clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match lock(&self.failure).clone() {
                Some(error) => Err(error),
                None => Ok(MintedToken {
                    firebase_token: format!("minted-{n}"),
                }),
            }
        })
    }
}

pub(crate) struct FakeDownstream {
    signed_in_with: Mutex<Vec<String>>,
    sign_outs: AtomicUsize,
    signed_in: AtomicBool,
    rejection: Mutex<Option<DownstreamError>>,
}

impl FakeDownstream {
    pub(crate) fn new() -> Self {
        Self {
            signed_in_with: Mutex::new(Vec::new()),
            sign_outs: AtomicUsize::new(0),
            signed_in: AtomicBool::new(false),
            rejection: Mutex::new(None),
        }
    }

    pub(crate) fn reject_with(&self, error: DownstreamError) {
        *lock(&self.rejection) = Some(error);
    }

    /// Tokens accepted by `sign_in`.
    pub(crate) fn signed_in_with(&self) -> Vec<String> {
        lock(&self.signed_in_with).clone()
    }

    pub(crate) fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

impl DownstreamAuth for FakeDownstream {
    fn sign_in<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), DownstreamError>> {
        Box::pin(async move {
            if let Some(error) = lock(&self.rejection).clone() {
                return Err(error);
            }
            lock(&self.signed_in_with).push(token.to_string());
            self.signed_in.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn sign_out(&self) {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.signed_in.store(false, Ordering::SeqCst);
    }

    fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Navigation {
    Route(String),
    Url(String),
    External(String),
}

pub(crate) struct RecordingNavigator {
    current: String,
    history: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub(crate) fn new(current: &str) -> Self {
        Self {
            current: current.to_string(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn history(&self) -> Vec<Navigation> {
        lock(&self.history).clone()
    }

    pub(crate) fn last(&self) -> Option<Navigation> {
        lock(&self.history).last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        lock(&self.history).push(Navigation::Route(route.to_string()));
    }

    fn navigate_by_url(&self, url: &str) {
        lock(&self.history).push(Navigation::Url(url.to_string()));
    }

    fn navigate_external(&self, url: &str) {
        lock(&self.history).push(Navigation::External(url.to_string()));
    }

    fn current_route(&self) -> String {
        self.current.clone()
    }
}

pub(crate) struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub(crate) fn new(now_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(now_millis),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
