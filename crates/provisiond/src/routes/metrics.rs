//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::ProvisioningDispatcher;

#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub dispatcher: Arc<ProvisioningDispatcher>,
}

/// GET /metrics: returns Prometheus-formatted metrics.
///
/// Worker pool gauges are sampled at scrape time.
pub async fn get(State(state): State<MetricsState>) -> impl IntoResponse {
    metrics::gauge!("provisioning_queue_depth").set(state.dispatcher.queue_depth() as f64);
    metrics::gauge!("provisioning_runs_in_flight").set(state.dispatcher.in_flight() as f64);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.handle.render(),
    )
}
