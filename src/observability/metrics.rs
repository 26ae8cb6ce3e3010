//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, rewritten
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_upstream_errors_total` (counter): synthetic failures by kind
//! - `rewrite_titles_total` (counter): titles seen, by outcome
//! - `normalizer_cache_hits_total` (counter)
//! - `normalizer_calls_total` (counter): oracle calls by outcome
//! - `normalizer_cache_entries` (gauge)
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Label values are low-cardinality (no paths, no titles)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, rewritten: bool, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "rewritten" => if rewritten { "true" } else { "false" },
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_titles(changed: usize, unchanged: usize) {
    counter!("rewrite_titles_total", "outcome" => "changed").increment(changed as u64);
    counter!("rewrite_titles_total", "outcome" => "unchanged").increment(unchanged as u64);
}

pub fn record_cache_hit() {
    counter!("normalizer_cache_hits_total").increment(1);
}

pub fn record_normalizer_call(outcome: &'static str) {
    counter!("normalizer_calls_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("normalizer_cache_entries").set(entries as f64);
}
