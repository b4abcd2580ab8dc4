//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mgmtd_registrations_total` (counter): subsystem registrations by step
//! - `mgmtd_subscriptions_total` (counter): bus watches by name and result
//! - `mgmtd_bus_signals_total` (counter): signals delivered per watch
//! - `mgmtd_http_requests_total` (counter): requests by method and status
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Exporter is optional and off by default

use std::net::SocketAddr;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_registration(step: &'static str) {
    metrics::counter!("mgmtd_registrations_total", "step" => step).increment(1);
}

pub fn record_subscription(watch: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "failed" };
    metrics::counter!("mgmtd_subscriptions_total", "watch" => watch, "result" => result)
        .increment(1);
}

pub fn record_signal(watch: &'static str) {
    metrics::counter!("mgmtd_bus_signals_total", "watch" => watch).increment(1);
}

/// Middleware counting every request by method and response status.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::counter!(
        "mgmtd_http_requests_total",
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
