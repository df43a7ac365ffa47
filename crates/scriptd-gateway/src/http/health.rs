use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with registry counts.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("SCRIPTD_GIT_SHA"),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "scripts": state.registry.script_count(),
        "tasks": state.registry.task_count(),
        "storage": state.config.storage.scripts,
    }))
}
