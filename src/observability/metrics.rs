//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sanitizer_requests_total` (counter): requests by method, status
//! - `sanitizer_request_duration_seconds` (histogram): latency distribution
//! - `sanitizer_degraded_fields_total` (counter): degraded query fields by name

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "sanitizer_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "sanitizer_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_degraded(field: &'static str) {
    metrics::counter!("sanitizer_degraded_fields_total", "field" => field).increment(1);
}
