//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded requests by method, status
//! - `proxy_request_duration_seconds` (histogram): upstream latency
//! - `header_rewrite_values_total` (counter): values changed by a rule
//! - `header_rewrite_skipped_total` (counter): rules whose header was absent
//! - `header_rewrite_rejected_total` (counter): replacements that were not
//!   legal header values
//!
//! # Design Decisions
//! - Labels for instance, header, method and status code
//! - Header labels come from configuration, so cardinality stays bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::rewrite::{RewriteEvent, RewriteObserver};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one forwarded request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Counts rewrite events per instance and header.
#[derive(Debug, Clone)]
pub struct MetricsObserver {
    instance: String,
}

impl MetricsObserver {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }
}

impl RewriteObserver for MetricsObserver {
    fn on_event(&self, event: &RewriteEvent<'_>) {
        let name = match event {
            RewriteEvent::Rewritten { .. } => "header_rewrite_values_total",
            RewriteEvent::NoValues { .. } => "header_rewrite_skipped_total",
            RewriteEvent::ValueRejected { .. } => "header_rewrite_rejected_total",
            RewriteEvent::Unmatched { .. } => return,
        };
        let labels = [
            ("instance", self.instance.clone()),
            ("header", event.header().to_string()),
        ];
        counter!(name, &labels).increment(1);
    }
}
