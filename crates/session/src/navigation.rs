//! Navigation boundary
//!
//! The coordinator never routes by itself; it tells the host where the user
//! should go next.

pub trait Navigator: Send + Sync {
    /// Go to an application route, e.g. the default route after logout.
    fn navigate(&self, route: &str);

    /// Go to a stored URL (route plus query), e.g. the post-login target.
    fn navigate_by_url(&self, url: &str);

    /// Leave the application for the identity provider's login page.
    fn navigate_external(&self, url: &str);

    /// Route the user is on right now.
    fn current_route(&self) -> String;
}
