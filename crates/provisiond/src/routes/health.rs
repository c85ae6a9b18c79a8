//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use orchestrator::ProvisioningDispatcher;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Launches waiting for a worker.
    pub queue_depth: usize,
    /// Runs executing right now.
    pub in_flight: usize,
}

/// GET /health: returns service health and worker pool load.
pub async fn check(State(dispatcher): State<Arc<ProvisioningDispatcher>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        workers: dispatcher.worker_count(),
        queue_capacity: dispatcher.queue_capacity(),
        queue_depth: dispatcher.queue_depth(),
        in_flight: dispatcher.in_flight(),
    })
}
