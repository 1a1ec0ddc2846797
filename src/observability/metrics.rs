//! Metrics collection and exposition.
//!
//! # Metrics
//! - `payout_queue_depth` (gauge): payments waiting for dispatch
//! - `payout_dispatch_total` (counter): dispatch ticks by outcome
//! - `payout_terminal_total` (counter): finished payments by status
//! - `payout_rpc_failures_total` (counter): failed chain calls by operation

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn set_queue_depth(depth: usize) {
    ::metrics::gauge!("payout_queue_depth").set(depth as f64);
}

pub fn record_dispatch(outcome: &'static str) {
    ::metrics::counter!("payout_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn record_terminal(status: &'static str) {
    ::metrics::counter!("payout_terminal_total", "status" => status).increment(1);
}

pub fn record_rpc_failure(op: &'static str) {
    ::metrics::counter!("payout_rpc_failures_total", "op" => op).increment(1);
}
