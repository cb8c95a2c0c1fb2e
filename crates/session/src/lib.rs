//! Federated session coordinator
//!
//! Drives the login handshake against the identity provider, exchanges the
//! provider credential for a downstream token, and keeps that token alive
//! with a self-renewing timer.
//!
//! Session lifecycle:
//! 1. `login()` stores the post-login route and navigates to the provider
//! 2. `handle_login_callback()` parses the returned fragment → `CallbackPending`
//! 3. Profile fetched → `Authenticated { downstream: Pending }`, expiry stored,
//!    token exchange started, navigation to the stored route
//! 4. Downstream sign-in succeeds → `Authenticated { downstream: SignedIn }`,
//!    renewal armed
//! 5. Renewal fires after the fixed token lifetime → exchange again → step 4
//! 6. `logout()` from any phase → `LoggedOut`, store cleared, timers cancelled

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod navigation;
pub mod renewal;
pub mod state;

#[cfg(test)]
mod fakes;

pub use clock::{Clock, SystemClock};
pub use coordinator::{Collaborators, SessionCoordinator, SessionOptions};
pub use error::SessionError;
pub use navigation::Navigator;
pub use renewal::DOWNSTREAM_TOKEN_LIFETIME;
pub use state::{DownstreamStatus, Session, SessionEvent, SessionPhase, transition};
