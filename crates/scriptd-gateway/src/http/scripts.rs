//! `/api/scripts` handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use scriptd_core::ScriptId;
use scriptd_registry::{NewScript, Script, ScriptContent, ScriptSummary, ScriptUpdate, Upload};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScriptBody {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub script_type: String,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub message: String,
    pub output: String,
    pub exit_code: i32,
}

/// GET /api/scripts
pub async fn list_scripts(State(state): State<Arc<AppState>>) -> Json<Vec<ScriptSummary>> {
    Json(state.registry.list_scripts())
}

/// POST /api/scripts with a JSON body.
pub async fn create_script(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateScriptBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Script>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let script = state.registry.create_script(NewScript {
        name: body.name,
        script_type: body.script_type,
        content: body.content,
        upload: None,
    })?;
    Ok((StatusCode::CREATED, Json(script)))
}

/// POST /api/scripts/upload with multipart fields `name`, `type`,
/// `content` and/or `file`.
pub async fn upload_script(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Script>), ApiError> {
    let mut new = NewScript::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                new.upload = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "name" | "type" | "content" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                match field_name.as_str() {
                    "name" => new.name = text,
                    "type" => new.script_type = text,
                    _ => new.content = Some(text),
                }
            }
            _ => {}
        }
    }

    let script = state.registry.create_script(new)?;
    Ok((StatusCode::CREATED, Json(script)))
}

/// GET /api/scripts/{id}/content
pub async fn script_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScriptContent>, ApiError> {
    Ok(Json(state.registry.script_content(&ScriptId::from(id))?))
}

/// PUT /api/scripts/{id}
pub async fn update_script(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<ScriptUpdate>, JsonRejection>,
) -> Result<Json<Script>, ApiError> {
    let Json(update) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(state.registry.update_script(&ScriptId::from(id), update)?))
}

/// DELETE /api/scripts/{id}: also removes every task of the script.
pub async fn delete_script(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.registry.delete_script(&ScriptId::from(id))?;
    info!(script_id = %deleted.id, tasks_removed = deleted.tasks_removed, "script removed via API");
    Ok(Json(json!({
        "message": format!(
            "Script '{}' and {} scheduled task(s) deleted",
            deleted.name, deleted.tasks_removed
        ),
    })))
}

/// POST /api/scripts/{id}/run: waits for the script to exit.
pub async fn run_script(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    let result = state.registry.run_script(&ScriptId::from(id)).await?;
    Ok(Json(RunResponse {
        message: "Script finished".to_string(),
        output: result.output,
        exit_code: result.exit_code,
    }))
}
