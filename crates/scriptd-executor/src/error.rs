//! Error types for the scriptd-executor crate.

use thiserror::Error;

/// Everything that can stop a run from producing a [`RunResult`](crate::RunResult).
///
/// A script that exits non-zero is *not* an error; it yields a normal result.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The interpreter process could not be started at all.
    #[error("Failed to launch '{program}': {detail}")]
    Launch { program: String, detail: String },

    /// The payload file was not on disk when the run was requested.
    #[error("Script file not found on disk: {0}")]
    ScriptMissing(String),

    /// Pipe or wait failure after the child was spawned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Build a launch error, adding a configuration hint when the binary is missing.
    pub(crate) fn launch(program: &str, source: std::io::Error) -> Self {
        let detail = if source.kind() == std::io::ErrorKind::NotFound {
            format!(
                "interpreter not found; check the [interpreters] configuration or PATH ({source})"
            )
        } else {
            source.to_string()
        };
        ExecutorError::Launch {
            program: program.to_string(),
            detail,
        }
    }

    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorError::Launch { .. } => "LAUNCH_FAILURE",
            ExecutorError::ScriptMissing(_) => "SCRIPT_FILE_MISSING",
            ExecutorError::Io(_) => "IO_FAILURE",
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ExecutorError>;
