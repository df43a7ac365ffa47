use scriptd_executor::ExecutorError;
use thiserror::Error;

/// Broad classes callers map to responses (HTTP status, exit code, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    LaunchFailure,
    IoFailure,
}

/// Errors that can occur within the registry subsystem.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No script with the given ID exists.
    #[error("Script not found: {id}")]
    ScriptNotFound { id: String },

    /// No task with the given ID exists.
    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    /// Missing field, unsupported type, attempted type change, ...
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The cron expression does not follow the 5-field grammar.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// The record exists but its payload file is gone.
    #[error("Script file missing on disk for {id}: {path}")]
    PayloadMissing { id: String, path: String },

    /// The executor could not produce a result.
    #[error(transparent)]
    Execution(#[from] ExecutorError),

    /// Payload read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::ScriptNotFound { .. } | RegistryError::TaskNotFound { .. } => {
                ErrorKind::NotFound
            }
            RegistryError::Validation(_) | RegistryError::InvalidCron { .. } => {
                ErrorKind::Validation
            }
            RegistryError::Execution(ExecutorError::Launch { .. }) => ErrorKind::LaunchFailure,
            RegistryError::Execution(ExecutorError::ScriptMissing(_)) => ErrorKind::NotFound,
            RegistryError::Execution(ExecutorError::Io(_))
            | RegistryError::PayloadMissing { .. }
            | RegistryError::Database(_)
            | RegistryError::Io(_) => ErrorKind::IoFailure,
        }
    }

    /// Short error code string sent to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::Database(_) => "DATABASE_ERROR",
            RegistryError::ScriptNotFound { .. } => "SCRIPT_NOT_FOUND",
            RegistryError::TaskNotFound { .. } => "TASK_NOT_FOUND",
            RegistryError::Validation(_) => "VALIDATION_ERROR",
            RegistryError::InvalidCron { .. } => "INVALID_CRON",
            RegistryError::PayloadMissing { .. } => "PAYLOAD_MISSING",
            RegistryError::Execution(e) => e.code(),
            RegistryError::Io(_) => "IO_FAILURE",
        }
    }

    pub(crate) fn script_not_found(id: &impl ToString) -> Self {
        RegistryError::ScriptNotFound { id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            RegistryError::script_not_found(&"x").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RegistryError::InvalidCron {
                expression: "* * * *".into(),
                reason: "4 fields".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        let launch = RegistryError::from(ExecutorError::Launch {
            program: "node".into(),
            detail: "not found".into(),
        });
        assert_eq!(launch.kind(), ErrorKind::LaunchFailure);
        assert_eq!(launch.code(), "LAUNCH_FAILURE");
        assert_eq!(
            RegistryError::PayloadMissing {
                id: "a".into(),
                path: "/x".into()
            }
            .kind(),
            ErrorKind::IoFailure
        );
    }
}
