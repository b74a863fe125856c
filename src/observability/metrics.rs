//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shield_guard_decisions_total` (counter): by guard and outcome
//! - `shield_threat_escalations_total` (counter): by new threat level
//! - `shield_sweep_removed_total` (counter): entries reclaimed, by store
//! - `shield_store_entries` (gauge): entries held after the last sweep, by store
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and owns its own listener

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of one guard check ("threat" / "rate_limit").
pub fn record_guard_decision(guard: &'static str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    counter!("shield_guard_decisions_total", "guard" => guard, "outcome" => outcome).increment(1);
}

pub fn record_threat_escalation(level: &'static str) {
    counter!("shield_threat_escalations_total", "level" => level).increment(1);
}

/// Record one sweep pass.
pub fn record_sweep(store: &'static str, removed: usize, remaining: usize) {
    counter!("shield_sweep_removed_total", "store" => store).increment(removed as u64);
    gauge!("shield_store_entries", "store" => store).set(remaining as f64);
}
