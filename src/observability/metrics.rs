//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hub_exchange_requests_total` (counter): inbound exchanges by outcome
//! - `hub_peer_calls_total` (counter): outbound calls by peer, provenance
//! - `hub_peer_call_duration_seconds` (histogram): network time per peer
//! - `hub_breaker_transitions_total` (counter): breaker state changes
//! - `hub_rate_limited_total` (counter): inbound requests refused
//! - `hub_fallback_snapshot_entries` (gauge): peers in the loaded snapshot
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are bounded by the configured peer set

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_exchange(outcome: &'static str) {
    ::metrics::counter!("hub_exchange_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_peer_call(peer: &str, provenance: &'static str) {
    ::metrics::counter!(
        "hub_peer_calls_total",
        "peer" => peer.to_string(),
        "provenance" => provenance
    )
    .increment(1);
}

pub fn record_peer_latency(peer: &str, started: Instant) {
    ::metrics::histogram!("hub_peer_call_duration_seconds", "peer" => peer.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_breaker_transition(peer: &str, to: &'static str) {
    ::metrics::counter!(
        "hub_breaker_transitions_total",
        "peer" => peer.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_rate_limited() {
    ::metrics::counter!("hub_rate_limited_total").increment(1);
}

pub fn record_fallback_entries(entries: usize) {
    ::metrics::gauge!("hub_fallback_snapshot_entries").set(entries as f64);
}
