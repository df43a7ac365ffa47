//! `ProcessExecutor` launches one interpreter process per run.
//!
//! The executor holds no mutable state, so a single instance can be shared
//! behind an `Arc` and called concurrently, including for the same script.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use scriptd_core::config::InterpreterConfig;
use scriptd_core::ScriptType;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::capture;
use crate::error::{ExecutorError, Result};
use crate::types::{RunRequest, RunResult};

/// Set on every child so the script can find its own record.
pub const SCRIPT_ID_ENV: &str = "SCRIPTD_SCRIPT_ID";
/// Set on children started by a cron firing.
pub const TASK_ID_ENV: &str = "SCRIPTD_TASK_ID";

/// Anything that can turn a [`RunRequest`] into a [`RunResult`].
///
/// The scheduler only depends on this trait, which keeps timer tests free of
/// real processes.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, request: RunRequest) -> Result<RunResult>;
}

/// Runs scripts with the interpreter configured for their type.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    interpreters: InterpreterConfig,
}

impl ProcessExecutor {
    pub fn new(interpreters: InterpreterConfig) -> Self {
        Self { interpreters }
    }

    /// The binary that will be launched for `script_type`.
    pub fn interpreter(&self, script_type: ScriptType) -> &str {
        self.interpreters.binary_for(script_type)
    }

    /// Spawn the interpreter with the script path as its only argument and
    /// wait for it to exit.
    ///
    /// stdout and stderr are drained on their own tasks while the child runs,
    /// so a chatty script cannot deadlock on a full pipe.
    ///
    /// # Errors
    ///
    /// - `ScriptMissing`: the payload file does not exist.
    /// - `Launch`: the interpreter could not be started.
    /// - `Io`: waiting on the child failed.
    pub async fn execute(&self, request: RunRequest) -> Result<RunResult> {
        if tokio::fs::metadata(&request.path).await.is_err() {
            return Err(ExecutorError::ScriptMissing(
                request.path.display().to_string(),
            ));
        }

        let program = self.interpreter(request.script_type).to_string();
        info!(
            script_id = %request.script_id,
            program = %program,
            path = %request.path.display(),
            "launching script"
        );

        let mut cmd = Command::new(&program);
        cmd.arg(&request.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        cmd.env(SCRIPT_ID_ENV, request.script_id.as_str());

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            warn!(script_id = %request.script_id, program = %program, error = %e, "launch failed");
            ExecutorError::launch(&program, e)
        })?;

        let stdout_task = tokio::spawn(capture::drain(child.stdout.take(), "stdout"));
        let stderr_task = tokio::spawn(capture::drain(child.stderr.take(), "stderr"));

        let status = child.wait().await?;
        let stdout = stdout_task.await.unwrap_or_default().into_text();
        let stderr = stderr_task.await.unwrap_or_default().into_text();
        let exit_code = status.code().unwrap_or(-1);
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            script_id = %request.script_id,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "streams closed"
        );
        info!(
            script_id = %request.script_id,
            name = %request.name,
            exit_code,
            duration_ms,
            "script finished"
        );

        Ok(RunResult {
            output: capture::render(&request, &stdout, &stderr, exit_code),
            exit_code,
            duration_ms,
        })
    }
}

#[async_trait]
impl ScriptRunner for ProcessExecutor {
    async fn run(&self, request: RunRequest) -> Result<RunResult> {
        self.execute(request).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
