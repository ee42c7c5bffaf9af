//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_breaker_transitions_total` (counter): state changes by breaker, target state
//! - `guard_breaker_rejections_total` (counter): fast-fail rejections by breaker
//! - `guard_breaker_fallbacks_total` (counter): fallback values returned by breaker
//! - `guard_rate_limited_total` (counter): rejected checks by limiter
//! - `guard_rate_limiter_active_keys` (gauge): tracked identifiers after each sweep
//! - `guard_operator_resets_total` (counter): admin resets by scope

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_transition(breaker: &str, to: &'static str) {
    counter!(
        "guard_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_breaker_rejection(breaker: &str) {
    counter!("guard_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_breaker_fallback(breaker: &str) {
    counter!("guard_breaker_fallbacks_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_rate_limited(limiter: &str) {
    counter!("guard_rate_limited_total", "limiter" => limiter.to_string()).increment(1);
}

pub fn record_active_keys(limiter: &str, active: usize) {
    gauge!("guard_rate_limiter_active_keys", "limiter" => limiter.to_string()).set(active as f64);
}

pub fn record_operator_reset(scope: &'static str) {
    counter!("guard_operator_resets_total", "scope" => scope).increment(1);
}
