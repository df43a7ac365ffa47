use std::path::PathBuf;

use chrono::{DateTime, Utc};
use scriptd_core::{ScriptId, ScriptType, TaskId};
use scriptd_executor::RunResult;
use serde::{Deserialize, Serialize};

/// A persisted script record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// UUID v4 string, primary key.
    pub id: ScriptId,
    /// Human-readable label.
    pub name: String,
    /// Interpreter kind; fixed at creation.
    #[serde(rename = "type")]
    pub script_type: ScriptType,
    /// `{storage_root}/{id}.{ext}`; fixed at creation.
    pub file_path: PathBuf,
    /// Expression of the most recently attached task, or empty.
    ///
    /// Display-only: a script with several tasks shows just the latest one.
    pub cron_expression: String,
    /// ISO-8601 timestamp of script creation.
    pub created_at: String,
    /// ISO-8601 timestamp of the last name/content change.
    pub updated_at: String,
}

impl Script {
    pub fn summary(&self) -> ScriptSummary {
        ScriptSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            script_type: self.script_type,
            cron_expression: self.cron_expression.clone(),
        }
    }
}

/// Listing view of a script. Never carries the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub id: ScriptId,
    pub name: String,
    #[serde(rename = "type")]
    pub script_type: ScriptType,
    pub cron_expression: String,
}

/// A script together with its payload text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptContent {
    pub id: ScriptId,
    pub name: String,
    #[serde(rename = "type")]
    pub script_type: ScriptType,
    pub content: String,
}

/// A payload handed over by the upload layer.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Client-side file name, if known.
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Input for [`ScriptStore::create`](crate::store::ScriptStore::create).
///
/// `script_type` stays a raw string so unsupported values are reported as
/// validation errors by the store itself.
#[derive(Debug, Clone, Default)]
pub struct NewScript {
    pub name: String,
    pub script_type: String,
    pub content: Option<String>,
    /// Wins over `content` when both are present.
    pub upload: Option<Upload>,
}

impl NewScript {
    pub fn inline(
        name: impl Into<String>,
        script_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            script_type: script_type.into(),
            content: Some(content.into()),
            upload: None,
        }
    }
}

/// Partial update. At least one of `name` / `content` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    /// Only accepted when it equals the current type.
    #[serde(rename = "type")]
    pub script_type: Option<String>,
}

/// What [`Registry::delete_script`](crate::Registry::delete_script) removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedScript {
    pub id: ScriptId,
    pub name: String,
    /// Tasks cascaded away with the script.
    pub tasks_removed: usize,
    /// False when the payload was already gone or could not be removed.
    pub payload_removed: bool,
}

/// Persisted half of a task. The live timer lives in a separate map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDef {
    pub id: TaskId,
    pub script_id: ScriptId,
    pub cron_expression: String,
    pub created_at: String,
}

/// Listing view of a task, with the owning script's current name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: TaskId,
    pub script_id: ScriptId,
    pub script_name: String,
    pub cron_expression: String,
}

/// How a scheduled firing ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The process ran; check `exit_code`.
    Finished(RunResult),
    /// Nothing ran (script gone, launch failure, ...).
    Failed { code: &'static str, message: String },
}

/// One-way notification emitted after every cron firing.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub task_id: TaskId,
    pub script_id: ScriptId,
    pub script_name: String,
    pub fired_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}
