//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_in_flight_requests` (gauge): requests currently being served
//! - `gateway_discovery_total` (counter): discovery outcomes by service
//! - `gateway_collaborator_calls_total` (counter): outbound call outcomes
//! - `gateway_registry_calls_total` (counter): register/deregister/heartbeat results
//! - `gateway_config_updates_total` (counter): watched key deliveries
//! - `gateway_lifecycle_state` (gauge): 0=starting 1=registered 2=draining 3=stopped
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are low-cardinality: service names and outcomes, never addresses

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a served request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_in_flight(count: u64) {
    gauge!("gateway_in_flight_requests").set(count as f64);
}

/// Record a discovery outcome: `hit`, `miss`, `not_found`, `unavailable`.
pub fn record_discovery(service: &str, outcome: &'static str) {
    counter!(
        "gateway_discovery_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an outbound collaborator call outcome.
pub fn record_collaborator_call(service: &str, outcome: &'static str) {
    counter!(
        "gateway_collaborator_calls_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_registry_call(operation: &'static str, success: bool) {
    counter!(
        "gateway_registry_calls_total",
        "operation" => operation,
        "result" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

pub fn record_config_update(key: &str) {
    counter!("gateway_config_updates_total", "key" => key.to_string()).increment(1);
}

pub fn record_lifecycle_state(state: u8) {
    gauge!("gateway_lifecycle_state").set(state as f64);
}
