//! `/api/tasks` handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use scriptd_core::{ScriptId, TaskId};
use scriptd_registry::TaskSummary;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    #[serde(default)]
    pub script_id: String,
    #[serde(default)]
    pub cron_expression: String,
}

/// GET /api/tasks
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskSummary>> {
    Json(state.registry.list_tasks())
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateTaskBody>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskSummary>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let task = state
        .registry
        .create_task(&ScriptId::from(body.script_id), &body.cron_expression)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.registry.delete_task(&TaskId::from(id))?;
    Ok(Json(json!({ "message": "Scheduled task deleted" })))
}
