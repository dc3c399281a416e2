//! Metrics collection and exposition.
//!
//! # Metrics
//! - `standby_pair_role` (gauge): 1=active, 0=stand-by
//! - `standby_pair_state_transitions_total` (counter): by target state
//! - `standby_pair_claims_total` (counter): by outcome (won, lost)
//! - `standby_pair_liveness_losses_total` (counter): by loss kind
//! - `standby_pair_liveness_connections` (gauge): stand-bys connected to us
//! - `standby_pair_registry_errors_total` (counter): by operation
//! - `pod_audit_cycles_total` (counter): by verdict
//! - `pod_audit_deletions_total` (counter): by result

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::election::{ElectionState, Role};

/// Start the Prometheus scrape endpoint. Must run inside the runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_role(role: Role) {
    let value = match role {
        Role::Active => 1.0,
        Role::StandBy => 0.0,
    };
    gauge!("standby_pair_role").set(value);
}

pub fn record_transition(state: ElectionState) {
    counter!("standby_pair_state_transitions_total", "state" => state.as_str()).increment(1);
}

pub fn record_claim(won: bool) {
    let outcome = if won { "won" } else { "lost" };
    counter!("standby_pair_claims_total", "outcome" => outcome).increment(1);
}

pub fn record_liveness_loss(kind: &'static str) {
    counter!("standby_pair_liveness_losses_total", "kind" => kind).increment(1);
}

pub fn record_liveness_connections(count: usize) {
    gauge!("standby_pair_liveness_connections").set(count as f64);
}

pub fn record_registry_error(op: &'static str) {
    counter!("standby_pair_registry_errors_total", "op" => op).increment(1);
}

pub fn record_audit_cycle(verdict: &'static str) {
    counter!("pod_audit_cycles_total", "verdict" => verdict).increment(1);
}

pub fn record_deletion(ok: bool) {
    let result = if ok { "deleted" } else { "failed" };
    counter!("pod_audit_deletions_total", "result" => result).increment(1);
}
