//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): inbound requests by supplier
//! - `relay_replies_total` (counter): replies by supplier, status
//! - `relay_replies_abandoned_total` (counter): replies with no live connection
//! - `relay_local_call_duration_seconds` (histogram): local API latency
//! - `relay_callbacks_total` (counter): callback deliveries by supplier, outcome
//! - `relay_legacy_callbacks_total` (counter): receiver hits by mode
//! - `relay_channel_state` (gauge): 0=disconnected, 1=connecting, 2=connected
//! - `relay_pending_replies` (gauge): in-flight requests per supplier

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::channel::ConnectionState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(supplier: &str) {
    counter!("relay_requests_total", "supplier" => supplier.to_string()).increment(1);
}

pub fn record_reply(supplier: &str, status: &'static str) {
    counter!(
        "relay_replies_total",
        "supplier" => supplier.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn record_abandoned(supplier: &str) {
    counter!("relay_replies_abandoned_total", "supplier" => supplier.to_string()).increment(1);
}

pub fn record_local_call(supplier: &str, ok: bool, start: Instant) {
    histogram!(
        "relay_local_call_duration_seconds",
        "supplier" => supplier.to_string(),
        "ok" => if ok { "true" } else { "false" }
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_callback(supplier: &str, outcome: &'static str) {
    counter!(
        "relay_callbacks_total",
        "supplier" => supplier.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_legacy_callback(mode: &'static str) {
    counter!("relay_legacy_callbacks_total", "mode" => mode).increment(1);
}

pub fn set_channel_state(supplier: &str, state: ConnectionState) {
    let value = match state {
        ConnectionState::Disconnected => 0.0,
        ConnectionState::Connecting => 1.0,
        ConnectionState::Connected => 2.0,
    };
    gauge!("relay_channel_state", "supplier" => supplier.to_string()).set(value);
}

pub fn set_pending(supplier: &str, pending: usize) {
    gauge!("relay_pending_replies", "supplier" => supplier.to_string()).set(pending as f64);
}
