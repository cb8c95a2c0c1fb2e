//! Session coordinator
//!
//! Owns the session, the single renewal timer and the in-flight token
//! exchange. All collaborators are injected so each can be replaced in tests.
//!
//! Callback handling is exclusive: `login()`, `handle_login_callback()` and
//! `get_user_info()` fail with `CallbackInProgress` while another one runs.
//! Background work (token exchange, renewal) runs on tokio tasks held in
//! `TaskSlot`s; results from a task that has been superseded or cancelled are
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use common::Secret;
use downstream::{DownstreamAuth, MintedToken, TokenExchange};
use identity::{Credential, CredentialStore, IdentityProvider, Profile};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::SessionError;
use crate::metrics;
use crate::navigation::Navigator;
use crate::renewal::{DOWNSTREAM_TOKEN_LIFETIME, TaskSlot};
use crate::state::{Session, SessionEvent, SessionPhase, transition};

/// External services the coordinator drives.
pub struct Collaborators {
    pub provider: Arc<dyn IdentityProvider>,
    pub exchange: Arc<dyn TokenExchange>,
    pub downstream: Arc<dyn DownstreamAuth>,
    pub store: Arc<CredentialStore>,
    pub navigator: Arc<dyn Navigator>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Where to go after logout, failed callbacks, or when no post-login
    /// route was stored
    pub default_route: String,
    /// Delay between downstream sign-in and the next token renewal
    pub renewal_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_route: "/".to_string(),
            renewal_delay: DOWNSTREAM_TOKEN_LIFETIME,
        }
    }
}

/// Handle to a coordinator. Cloning shares the same session.
///
/// Must be used from within a tokio runtime: token exchange and renewal run
/// as spawned tasks.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    exchange: Arc<dyn TokenExchange>,
    downstream: Arc<dyn DownstreamAuth>,
    store: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
    session: watch::Sender<Session>,
    /// Held for the whole of a callback; `try_lock` rejects a second one.
    callback_gate: tokio::sync::Mutex<()>,
    /// Bumped by every logout; a profile fetch that straddles one is dropped.
    logout_epoch: AtomicU64,
    renewal: TaskSlot,
    token_fetch: TaskSlot,
}

impl SessionCoordinator {
    pub fn new(collaborators: Collaborators, options: SessionOptions) -> Self {
        let (session, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(Inner {
                provider: collaborators.provider,
                exchange: collaborators.exchange,
                downstream: collaborators.downstream,
                store: collaborators.store,
                navigator: collaborators.navigator,
                clock: collaborators.clock,
                options,
                session,
                callback_gate: tokio::sync::Mutex::new(()),
                logout_epoch: AtomicU64::new(0),
                renewal: TaskSlot::new("renewal"),
                token_fetch: TaskSlot::new("token_fetch"),
            }),
        }
    }

    /// Resume from the credential store. Called once after construction.
    ///
    /// A stored credential that has not expired goes through `get_user_info`;
    /// an expired one is cleared; an absent or malformed one leaves the
    /// session logged out.
    pub async fn resume(&self) -> Result<(), SessionError> {
        let Some(credential) = self.inner.store.credential().await else {
            debug!("no persisted session");
            return Ok(());
        };

        if credential.expires_at() <= self.inner.clock.now_millis() {
            info!("persisted credential expired, clearing");
            if let Err(e) = self.inner.store.clear().await {
                warn!(error = %e, "failed to clear expired credential");
            }
            return Ok(());
        }

        info!("resuming persisted session");
        self.get_user_info(credential).await
    }

    /// Start a login: remember where to come back to, then leave for the
    /// provider. `redirect` defaults to the current route.
    pub async fn login(&self, redirect: Option<&str>) -> Result<(), SessionError> {
        let _gate = self
            .inner
            .callback_gate
            .try_lock()
            .map_err(|_| SessionError::CallbackInProgress)?;
        self.inner.begin_login(redirect).await;
        Ok(())
    }

    /// Process the provider's callback fragment.
    ///
    /// On a provider error the session returns to `LoggedOut`, the user is
    /// sent to the default route and the error is returned for display.
    pub async fn handle_login_callback(&self, fragment: &str) -> Result<(), SessionError> {
        let _gate = self
            .inner
            .callback_gate
            .try_lock()
            .map_err(|_| SessionError::CallbackInProgress)?;
        self.inner.handle_login_callback(fragment).await
    }

    /// Establish the session for a credential: fetch its profile, then set
    /// the session up. A failed profile lookup leaves the session in
    /// `CallbackPending`.
    pub async fn get_user_info(&self, credential: Credential) -> Result<(), SessionError> {
        let _gate = self
            .inner
            .callback_gate
            .try_lock()
            .map_err(|_| SessionError::CallbackInProgress)?;
        let epoch = self.inner.start_callback();
        self.inner.load_profile(credential, epoch).await
    }

    /// Arm the renewal timer, replacing any pending one. Cancels instead if
    /// not signed in downstream.
    pub fn schedule_renewal(&self) {
        self.inner.schedule_renewal();
    }

    /// Cancel the pending renewal, if any. Idempotent.
    pub fn unschedule_renewal(&self) {
        self.inner.unschedule_renewal();
    }

    /// End the session: clear the store and the in-memory session, cancel
    /// renewal and any in-flight exchange, sign out downstream, and go to
    /// the default route.
    pub async fn logout(&self) {
        self.inner.logout().await;
    }

    /// Whether the persisted provider credential has not yet expired.
    /// No persisted expiry → false.
    pub async fn token_valid(&self) -> bool {
        match self.inner.store.expires_at().await {
            Some(expires_at) => self.inner.clock.now_millis() < expires_at,
            None => false,
        }
    }

    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    /// Receive every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    pub fn renewal_scheduled(&self) -> bool {
        self.inner.renewal.is_armed()
    }

    pub fn token_fetch_in_flight(&self) -> bool {
        self.inner.token_fetch.is_armed()
    }
}

impl Inner {
    fn apply(&self, event: SessionEvent) {
        self.session.send_if_modified(|session| {
            let next = transition(session.phase, event);
            if next == session.phase {
                return false;
            }
            debug!(from = session.phase.label(), to = next.label(), ?event, "session transition");
            session.phase = next;
            true
        });
    }

    async fn begin_login(&self, redirect: Option<&str>) {
        let target = match redirect {
            Some(route) => route.to_string(),
            None => self.navigator.current_route(),
        };
        if let Err(e) = self.store.set_redirect(&target).await {
            warn!(error = %e, "failed to persist post-login route");
        }

        let url = self.provider.initiate_authorization();
        info!(redirect = %target, "redirecting to identity provider");
        self.navigator.navigate_external(&url);
    }

    /// Begin a callback. A session it replaces is torn down first, so nothing
    /// of it survives a failed re-login. Returns the logout epoch the
    /// callback's results are checked against.
    fn start_callback(&self) -> u64 {
        let epoch = self.logout_epoch.load(Ordering::SeqCst);
        self.unschedule_renewal();
        if self.token_fetch.cancel() {
            debug!("cancelled in-flight token exchange for new callback");
        }
        self.session.send_modify(|session| {
            session.access_token = None;
            session.profile = None;
        });
        if self.downstream.is_signed_in() {
            self.downstream.sign_out();
            info!("signed out previous downstream session");
        }
        self.apply(SessionEvent::CallbackStarted);
        epoch
    }

    fn logged_out_since(&self, epoch: u64) -> bool {
        self.logout_epoch.load(Ordering::SeqCst) != epoch
    }

    async fn handle_login_callback(self: &Arc<Self>, fragment: &str) -> Result<(), SessionError> {
        let epoch = self.start_callback();

        match self.provider.parse_callback(fragment) {
            Ok(credential) => {
                if let Err(e) = self.store.save_credential(&credential).await {
                    warn!(error = %e, "failed to persist provider credential");
                }
                self.load_profile(credential, epoch).await
            }
            Err(e) => {
                self.apply(SessionEvent::CallbackFailed);
                self.navigator.navigate(&self.options.default_route);
                error!(code = %e.code, message = %e.message, "error authenticating");
                metrics::record_callback("provider_error");
                Err(e.into())
            }
        }
    }

    async fn load_profile(
        self: &Arc<Self>,
        credential: Credential,
        epoch: u64,
    ) -> Result<(), SessionError> {
        if self.logged_out_since(epoch) {
            info!("logged out during callback, discarding credential");
            return Ok(());
        }
        self.session.send_modify(|session| {
            session.access_token = Some(Secret::new(credential.access_token.clone()));
        });

        let result = self.provider.fetch_user_info(&credential.access_token).await;
        if self.logged_out_since(epoch) {
            info!("logged out while fetching profile, discarding result");
            return Ok(());
        }

        match result {
            Ok(profile) => {
                metrics::record_callback("success");
                self.set_session(&credential, profile).await;
                Ok(())
            }
            Err(e) => {
                warn!(code = %e.code, message = %e.message, "error retrieving profile");
                self.apply(SessionEvent::ProfileFailed);
                metrics::record_callback("profile_error");
                Err(e.into())
            }
        }
    }

    /// The only place `logged_in` becomes true.
    async fn set_session(self: &Arc<Self>, credential: &Credential, profile: Profile) {
        let phase = self.session.borrow().phase;
        if phase != SessionPhase::CallbackPending {
            info!(phase = phase.label(), "no callback pending, not establishing session");
            return;
        }

        let expires_at = credential.expires_at();
        if let Err(e) = self.store.set_expires_at(expires_at).await {
            warn!(error = %e, "failed to persist credential expiry");
        }

        self.session.send_modify(|session| {
            session.profile = Some(profile);
        });
        self.apply(SessionEvent::ProfileLoaded);
        info!(expires_at, "session established");

        self.get_downstream_token();

        let target = match self.store.redirect().await {
            Some(route) => route,
            None => self.options.default_route.clone(),
        };
        self.navigator.navigate_by_url(&target);
    }

    /// Start a token exchange for the current access token, superseding any
    /// exchange in flight.
    fn get_downstream_token(self: &Arc<Self>) {
        let access_token = self.session.borrow().access_token.clone();
        let Some(access_token) = access_token else {
            warn!("no provider access token, prompting for login");
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                inner.begin_login(None).await;
            });
            return;
        };

        let inner = Arc::clone(self);
        let id = self.token_fetch.replace_with(move |id| {
            tokio::spawn(async move {
                inner.run_token_fetch(id, access_token).await;
            })
        });
        debug!(task = id, "token exchange started");
    }

    async fn run_token_fetch(self: &Arc<Self>, id: u64, access_token: Secret<String>) {
        let started = Instant::now();
        let result = self.exchange.exchange(access_token.expose_str()).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(minted) => {
                metrics::record_exchange("success", elapsed);
                if !self.token_fetch.is_current(id) {
                    debug!(task = id, "token exchange superseded, dropping result");
                    return;
                }
                self.downstream_auth(id, minted).await;
            }
            Err(e) => {
                metrics::record_exchange(e.kind(), elapsed);
                if !self.token_fetch.is_current(id) {
                    return;
                }
                error!(error = %e, "an error occurred fetching downstream token");
                self.apply(SessionEvent::ExchangeFailed);
            }
        }
        self.token_fetch.release(id);
    }

    async fn downstream_auth(self: &Arc<Self>, id: u64, minted: MintedToken) {
        match self.downstream.sign_in(&minted.firebase_token).await {
            Ok(()) => {
                if !self.token_fetch.is_current(id) {
                    if !self.session.borrow().logged_in() {
                        self.downstream.sign_out();
                    }
                    debug!(task = id, "sign-in superseded, not updating session");
                    return;
                }
                self.apply(SessionEvent::DownstreamSignedIn);
                metrics::record_downstream_signin("success");
                info!("successfully authenticated with downstream backend");
                self.schedule_renewal();
            }
            Err(e) => {
                metrics::record_downstream_signin("rejected");
                if !self.token_fetch.is_current(id) {
                    return;
                }
                error!(
                    code = %e.code,
                    message = %e.message,
                    "could not sign in to downstream backend"
                );
                self.apply(SessionEvent::DownstreamRejected);
            }
        }
    }

    fn schedule_renewal(self: &Arc<Self>) {
        let signed_in = self.session.borrow().logged_in_downstream();
        if !signed_in {
            self.unschedule_renewal();
            return;
        }

        let delay = self.options.renewal_delay;
        let deadline = tokio::time::Instant::now() + delay;
        let weak: Weak<Inner> = Arc::downgrade(self);
        self.renewal.replace_with(move |id| {
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.renewal.release(id) {
                    return;
                }
                info!("downstream token expired; fetching a new one");
                metrics::record_renewal_fired();
                inner.get_downstream_token();
            })
        });
        debug!(delay_secs = delay.as_secs(), "scheduled downstream token renewal");
    }

    fn unschedule_renewal(&self) {
        if self.renewal.cancel() {
            debug!("unscheduled downstream token renewal");
        }
    }

    async fn logout(&self) {
        self.logout_epoch.fetch_add(1, Ordering::SeqCst);
        self.unschedule_renewal();
        if self.token_fetch.cancel() {
            debug!("cancelled in-flight token exchange");
        }

        self.session.send_modify(|session| {
            session.access_token = None;
            session.profile = None;
        });
        self.apply(SessionEvent::LoggedOut);

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear credential store");
        }
        self.downstream.sign_out();
        metrics::record_logout();
        info!("logged out");

        self.navigator.navigate(&self.options.default_route);
    }
}
