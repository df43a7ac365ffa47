//! `scriptd-registry`: script records, cron tasks, and their persistence.
//!
//! # Overview
//!
//! [`Registry`] ties together three pieces:
//!
//! | Piece            | Owns                                               |
//! |------------------|----------------------------------------------------|
//! | [`ScriptStore`]  | script records and `{id}.{ext}` payload files      |
//! | [`TaskScheduler`]| task records and one live cron timer per task      |
//! | [`Database`]     | SQLite copy of both collections                    |
//!
//! Opening a registry loads scripts first, then re-validates persisted tasks
//! and re-arms the ones that still make sense (see [`reconcile`]).
//! Scheduled runs are fire-and-forget; their outcomes go out as
//! [`RunReport`]s on an optional mpsc channel.

pub mod db;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod timer;
pub mod types;

pub use db::Database;
pub use error::{ErrorKind, RegistryError, Result};
pub use reconcile::{reconcile, DroppedTask, ReconcileReport};
pub use registry::{Registry, RegistryOptions};
pub use schedule::CronSchedule;
pub use scheduler::TaskScheduler;
pub use store::ScriptStore;
pub use timer::Clock;
pub use types::{
    DeletedScript, NewScript, RunOutcome, RunReport, Script, ScriptContent, ScriptSummary,
    ScriptUpdate, TaskDef, TaskSummary, Upload,
};
