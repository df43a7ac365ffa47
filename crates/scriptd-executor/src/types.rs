//! Shared data types for scriptd-executor.

use std::path::PathBuf;

use scriptd_core::{ScriptId, ScriptType};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RunRequest
// ---------------------------------------------------------------------------

/// Everything needed to launch one script.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub script_id: ScriptId,
    /// Display name, used only in the output header.
    pub name: String,
    pub script_type: ScriptType,
    /// Payload file handed to the interpreter as its sole argument.
    pub path: PathBuf,
    /// Extra variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl RunRequest {
    pub fn new(
        script_id: ScriptId,
        name: impl Into<String>,
        script_type: ScriptType,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            script_id,
            name: name.into(),
            script_type,
            path: path.into(),
            env: Vec::new(),
        }
    }

    /// Add one environment variable for the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

/// Outcome of a process that ran to termination, whatever its exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Header, stdout, trailer and (if any) the stderr section.
    pub output: String,

    /// Process exit code (`-1` if killed by a signal).
    pub exit_code: i32,

    /// Wall-clock time from spawn to exit.
    pub duration_ms: u64,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
