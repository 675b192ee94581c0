//! Prometheus metrics.
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`install_exporter`] has run, so handlers and unit tests never need to
//! care whether an exporter exists.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Start the Prometheus scrape listener on `0.0.0.0:<port>`.
///
/// Runs on its own listener because the proxy router treats every path as a
/// proxy request.
pub fn install_exporter(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!("📈 Metrics listening on http://{}/metrics", addr);
    Ok(())
}

/// Count a finished request. `kind` is `playlist`, `passthrough` or `error`.
pub fn record_request(kind: &'static str, status: u16) {
    counter!("hlsgate_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
}

pub fn record_duration(kind: &'static str, start: Instant) {
    histogram!("hlsgate_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_access_denied() {
    counter!("hlsgate_access_denied_total").increment(1);
}

pub fn record_upstream_error() {
    counter!("hlsgate_upstream_errors_total").increment(1);
}

/// A playlist line that could not be resolved and was passed through.
pub fn record_rewrite_warning() {
    counter!("hlsgate_rewrite_warnings_total").increment(1);
}
