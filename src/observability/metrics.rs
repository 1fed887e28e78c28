//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, auth decisions, sign-ins, upstream latency)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `lap_requests_total` (counter): requests by kind, status
//! - `lap_auth_decisions_total` (counter): engine decisions
//! - `lap_sign_in_total` (counter): sign-in attempts by provider, result
//! - `lap_upstream_duration_seconds` (histogram): upstream latency by route
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality (no users, no paths beyond route mounts)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count a handled request. `kind` is the dispatch branch (proxy, sign_in, ...).
pub fn record_request(kind: &'static str, status: u16) {
    metrics::counter!(
        "lap_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_auth_decision(decision: &'static str) {
    metrics::counter!("lap_auth_decisions_total", "decision" => decision).increment(1);
}

pub fn record_sign_in(provider: &'static str, result: &'static str) {
    metrics::counter!(
        "lap_sign_in_total",
        "provider" => provider,
        "result" => result
    )
    .increment(1);
}

pub fn record_upstream(route: &str, start: Instant) {
    metrics::histogram!("lap_upstream_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}
