//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchyard_events_received_total` (counter): identified events by source, type
//! - `switchyard_events_rejected_total` (counter): intake failures by reason
//! - `switchyard_events_unrouted_total` (counter): events with no matching route
//! - `switchyard_deliveries_total` (counter): route pipeline outcomes by sink, outcome
//! - `switchyard_connections_established_total` (counter): shared sessions opened by channel
//! - `switchyard_connection_failures_total` (counter): failed establishments by channel, reason
//! - `switchyard_connections_active` (gauge): live sessions by channel

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_event_received(source: &str, event_type: &str) {
    metrics::counter!(
        "switchyard_events_received_total",
        "source" => source.to_string(),
        "type" => event_type.to_string()
    )
    .increment(1);
}

pub fn record_event_rejected(reason: &'static str) {
    metrics::counter!("switchyard_events_rejected_total", "reason" => reason).increment(1);
}

pub fn record_event_unrouted() {
    metrics::counter!("switchyard_events_unrouted_total").increment(1);
}

/// `outcome` is one of `delivered`, `filtered`, `failed`, `unresolved`.
pub fn record_delivery(sink: &str, outcome: &'static str) {
    metrics::counter!(
        "switchyard_deliveries_total",
        "sink" => sink.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_connection_established(channel: &'static str) {
    metrics::counter!("switchyard_connections_established_total", "channel" => channel).increment(1);
}

pub fn record_connection_failure(channel: &'static str, reason: &'static str) {
    metrics::counter!(
        "switchyard_connection_failures_total",
        "channel" => channel,
        "reason" => reason
    )
    .increment(1);
}

pub fn set_active_connections(channel: &'static str, active: u64) {
    metrics::gauge!("switchyard_connections_active", "channel" => channel).set(active as f64);
}
