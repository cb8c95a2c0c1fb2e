//! Error types for session operations

use identity::ProviderError;

/// Errors surfaced to callers of the coordinator.
///
/// Exchange and downstream failures are not here: they are handled inside the
/// coordinator and only show up in the session phase.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a login callback is already being processed")]
    CallbackInProgress,

    #[error("could not sign in: {0}")]
    Provider(#[from] ProviderError),
}
