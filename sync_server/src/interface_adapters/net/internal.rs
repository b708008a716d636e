use crate::interface_adapters::protocol::StateSyncPayload;
use crate::interface_adapters::state::AppState;

use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Returns the latest published snapshot in `state_sync` payload shape.
pub async fn state_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Clone out of the watch before serializing so the borrow is not held.
    let snapshot = state.session.latest_snapshot();
    Json(StateSyncPayload::from(&snapshot))
}
