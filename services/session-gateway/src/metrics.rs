//! Prometheus metrics exposition
//!
//! The session crate records through the `metrics` facade; this module
//! installs the process-wide exporter that `/metrics` renders.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use session::metrics::TOKEN_EXCHANGE_DURATION;

/// Buckets for `session_token_exchange_duration_seconds`, 5ms up to the
/// longest sensible exchange timeout.
const EXCHANGE_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(TOKEN_EXCHANGE_DURATION.to_string()),
            EXCHANGE_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The exchange duration renders as a histogram (`_bucket` lines) rather
/// than the default summary.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

#[cfg(test)]
pub fn test_handle() -> PrometheusHandle {
    builder().build_recorder().handle()
}
