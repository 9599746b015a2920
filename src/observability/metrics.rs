//! Metrics collection and exposition.
//!
//! # Metrics
//! - `blobs_written_total` (counter): blobs stored, by side and blob type
//! - `blobs_written_bytes_total` (counter): payload bytes stored, by side
//! - `blobs_skipped_total` (counter): captures not attempted, by side and reason
//! - `blobs_failed_total` (counter): captures that failed, by side and stage
//! - `proxy_requests_total` (counter): proxied requests, by method and status
//! - `proxy_request_duration_seconds` (histogram): proxy latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The exporter serves its own listener, separate from proxied traffic

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(err) => tracing::error!(address = %addr, error = %err, "Failed to install metrics exporter"),
    }
}

pub fn record_blob_written(side: &'static str, blob_type: &'static str, bytes: usize) {
    counter!("blobs_written_total", "side" => side, "blob_type" => blob_type).increment(1);
    counter!("blobs_written_bytes_total", "side" => side).increment(bytes as u64);
}

pub fn record_blob_skipped(side: &'static str, reason: &'static str) {
    counter!("blobs_skipped_total", "side" => side, "reason" => reason).increment(1);
}

pub fn record_blob_failed(side: &'static str, stage: &'static str) {
    counter!("blobs_failed_total", "side" => side, "stage" => stage).increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    counter!("proxy_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method, "status" => status)
        .record(start.elapsed().as_secs_f64());
}
