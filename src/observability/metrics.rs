//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): invocations by response status
//! - `relay_request_duration_seconds` (histogram): end-to-end latency
//! - `relay_upstream_attempts_total` (counter): upstream calls by shape, outcome
//! - `relay_result_fetches_total` (counter): result URL fetches by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed, so tests and the
//!   pipeline never depend on one
//! - Labels stay low-cardinality (no URLs, no request ids)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("relay_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("relay_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_attempt(shape: &'static str, outcome: &'static str) {
    metrics::counter!("relay_upstream_attempts_total", "shape" => shape, "outcome" => outcome).increment(1);
}

pub fn record_result_fetch(outcome: &'static str) {
    metrics::counter!("relay_result_fetches_total", "outcome" => outcome).increment(1);
}
