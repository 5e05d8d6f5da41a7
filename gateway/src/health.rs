// Minimal liveness endpoint (spec's ambient-stack note — grounded on the
// teacher's `api/rest.rs::health`, trimmed to what a process behind a load
// balancer actually needs).

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    connected_clients: usize,
    pending_tasks: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        connected_clients: state.clients.connected_count(),
        pending_tasks: state.tasks.pending_count(),
    })
}
