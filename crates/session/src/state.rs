//! Session state machine
//!
//! Pure transitions: `transition(phase, event)` returns the next phase and
//! does no I/O. The coordinator applies events as its asynchronous steps
//! complete.
//!
//! Transitions:
//! - any → CallbackPending (callback or resume started)
//! - CallbackPending → LoggedOut (provider error)
//! - CallbackPending → Authenticated{Pending} (profile loaded)
//! - CallbackPending → CallbackPending (profile lookup failed)
//! - Authenticated{_} → Authenticated{SignedIn | Failed} (downstream outcome)
//! - any → LoggedOut (logout)

use common::Secret;
use identity::Profile;

/// Downstream sign-in status while provider-authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownstreamStatus {
    /// Exchange or sign-in not completed yet
    Pending,
    /// Signed in with a minted token
    SignedIn,
    /// Sign-in rejected the minted token
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    LoggedOut,
    /// Callback (or resume) being processed
    CallbackPending,
    /// Provider credential validated and profile loaded
    Authenticated { downstream: DownstreamStatus },
}

impl SessionPhase {
    /// Label for logging and the session endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::LoggedOut => "logged_out",
            SessionPhase::CallbackPending => "callback_pending",
            SessionPhase::Authenticated {
                downstream: DownstreamStatus::Pending,
            } => "authenticated_downstream_pending",
            SessionPhase::Authenticated {
                downstream: DownstreamStatus::SignedIn,
            } => "authenticated",
            SessionPhase::Authenticated {
                downstream: DownstreamStatus::Failed,
            } => "authenticated_downstream_failed",
        }
    }
}

/// Events that drive phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Callback handling (or session resume) began
    CallbackStarted,
    /// Provider returned an error or no credential
    CallbackFailed,
    /// Profile fetched; the session is established
    ProfileLoaded,
    /// Profile lookup failed
    ProfileFailed,
    /// Minting endpoint failed
    ExchangeFailed,
    /// Downstream accepted the minted token
    DownstreamSignedIn,
    /// Downstream rejected the minted token
    DownstreamRejected,
    /// `logout()`
    LoggedOut,
}

/// Total transition function. Pairs not listed keep the current phase.
pub fn transition(phase: SessionPhase, event: SessionEvent) -> SessionPhase {
    use SessionEvent as E;
    use SessionPhase as P;

    match (phase, event) {
        (_, E::LoggedOut) => P::LoggedOut,

        // A new callback may start from any phase (re-login included).
        (_, E::CallbackStarted) => P::CallbackPending,

        (P::CallbackPending, E::CallbackFailed) => P::LoggedOut,
        (P::CallbackPending, E::ProfileLoaded) => P::Authenticated {
            downstream: DownstreamStatus::Pending,
        },
        // No way out except another callback or logout.
        (P::CallbackPending, E::ProfileFailed) => P::CallbackPending,

        // Exchange failure leaves the downstream status untouched.
        (P::Authenticated { downstream }, E::ExchangeFailed) => P::Authenticated { downstream },
        (P::Authenticated { .. }, E::DownstreamSignedIn) => P::Authenticated {
            downstream: DownstreamStatus::SignedIn,
        },
        (P::Authenticated { .. }, E::DownstreamRejected) => P::Authenticated {
            downstream: DownstreamStatus::Failed,
        },

        (phase, _) => phase,
    }
}

/// Snapshot of the coordinator's session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub phase: SessionPhase,
    /// Provider access token; set when a credential is being used
    pub access_token: Option<Secret<String>>,
    pub profile: Option<Profile>,
}

impl Session {
    pub fn logged_in(&self) -> bool {
        matches!(self.phase, SessionPhase::Authenticated { .. })
    }

    pub fn loading(&self) -> bool {
        self.phase == SessionPhase::CallbackPending
    }

    pub fn logged_in_downstream(&self) -> bool {
        self.phase
            == SessionPhase::Authenticated {
                downstream: DownstreamStatus::SignedIn,
            }
    }
}
