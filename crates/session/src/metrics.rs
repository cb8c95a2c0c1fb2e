//! Session metrics
//!
//! Recorded through the `metrics` facade; the hosting service installs the
//! exporter. Without a recorder these calls are no-ops.
//!
//! - `session_callbacks_total` (counter): label `outcome`
//! - `session_token_exchanges_total` (counter): label `outcome`
//! - `session_token_exchange_duration_seconds` (histogram)
//! - `session_downstream_signins_total` (counter): label `outcome`
//! - `session_renewals_fired_total` (counter)
//! - `session_logouts_total` (counter)

pub const TOKEN_EXCHANGE_DURATION: &str = "session_token_exchange_duration_seconds";

/// `outcome`: `success`, `provider_error` or `profile_error`.
pub fn record_callback(outcome: &'static str) {
    metrics::counter!("session_callbacks_total", "outcome" => outcome).increment(1);
}

/// `outcome`: `success`, `error` or `timeout`.
pub fn record_exchange(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("session_token_exchanges_total", "outcome" => outcome).increment(1);
    metrics::histogram!(TOKEN_EXCHANGE_DURATION).record(duration_secs);
}

/// `outcome`: `success` or `rejected`.
pub fn record_downstream_signin(outcome: &'static str) {
    metrics::counter!("session_downstream_signins_total", "outcome" => outcome).increment(1);
}

pub fn record_renewal_fired() {
    metrics::counter!("session_renewals_fired_total").increment(1);
}

pub fn record_logout() {
    metrics::counter!("session_logouts_total").increment(1);
}
