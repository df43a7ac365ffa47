//! scriptd-executor: launches script interpreters and captures their output.
//!
//! One call, one child process. The interpreter is picked from the script
//! type through [`InterpreterConfig`](scriptd_core::config::InterpreterConfig);
//! the script path is its only argument. A non-zero exit is a normal
//! [`RunResult`]; only a process that never started is an error.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use scriptd_core::{config::InterpreterConfig, ScriptId, ScriptType};
//! use scriptd_executor::{ProcessExecutor, RunRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = ProcessExecutor::new(InterpreterConfig::default());
//!     let request = RunRequest::new(ScriptId::new(), "hello", ScriptType::Shell, "/tmp/hello.sh");
//!     let result = executor.execute(request).await.unwrap();
//!     println!("{} (exit {})", result.output, result.exit_code);
//! }
//! ```

mod capture;
pub mod error;
pub mod executor;
pub mod types;

pub use error::{ExecutorError, Result};
pub use executor::{ProcessExecutor, ScriptRunner, SCRIPT_ID_ENV, TASK_ID_ENV};
pub use types::{RunRequest, RunResult};
