//! `scriptd-core`: configuration and the identifiers shared by every
//! scriptd crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::ScriptdConfig;
pub use error::{CoreError, Result};
pub use types::{ScriptId, ScriptType, TaskId};
