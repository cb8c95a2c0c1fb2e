//! Navigation recorded for HTTP responses
//!
//! The coordinator says where the user should go; a handler takes the
//! recorded target after the call and turns it into a redirect.

use std::sync::Mutex;

use session::Navigator;
use tracing::debug;

/// Last navigation requested of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Application route or stored URL
    Route(String),
    /// Identity provider's hosted login page
    External(String),
}

#[derive(Default)]
struct State {
    current_route: Option<String>,
    pending: Option<Target>,
}

/// `Navigator` for a single-session gateway. Tracks the current route and
/// holds the latest target until a handler takes it.
pub struct HttpNavigator {
    default_route: String,
    state: Mutex<State>,
}

impl HttpNavigator {
    pub fn new(default_route: &str) -> Self {
        Self {
            default_route: default_route.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Drop any target left by background work so a handler only sees
    /// navigation requested during its own call.
    pub fn begin_request(&self) {
        if let Some(stale) = self.lock().pending.take() {
            debug!(navigation = ?stale, "dropping stale navigation target");
        }
    }

    /// Take the pending target, leaving none.
    pub fn take_target(&self) -> Option<Target> {
        self.lock().pending.take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_route(&self, route: &str) {
        debug!(route, "navigate");
        let mut state = self.lock();
        state.current_route = Some(route.to_string());
        state.pending = Some(Target::Route(route.to_string()));
    }
}

impl Navigator for HttpNavigator {
    fn navigate(&self, route: &str) {
        self.set_route(route);
    }

    fn navigate_by_url(&self, url: &str) {
        self.set_route(url);
    }

    fn navigate_external(&self, url: &str) {
        debug!("navigate to identity provider");
        self.lock().pending = Some(Target::External(url.to_string()));
    }

    fn current_route(&self) -> String {
        self.lock()
            .current_route
            .clone()
            .unwrap_or_else(|| self.default_route.clone())
    }
}
