//! Startup reconciliation: bring persisted tasks back to life.

use std::collections::HashSet;

use scriptd_core::TaskId;
use tracing::{info, warn};

use crate::error::Result;
use crate::scheduler::TaskScheduler;
use crate::schedule::CronSchedule;
use crate::types::TaskDef;

/// A persisted task that could not be re-armed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedTask {
    pub id: TaskId,
    pub reason: String,
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub armed: usize,
    pub dropped: Vec<DroppedTask>,
}

/// Re-validate every persisted task and arm the survivors.
///
/// A task is dropped when its script is gone, its expression no longer
/// parses, or its id repeats an earlier row. Dropping never fails the
/// startup; the pruned collection is written back once.
pub fn reconcile(scheduler: &TaskScheduler, persisted: Vec<TaskDef>) -> Result<ReconcileReport> {
    let mut state = scheduler.lock();
    let mut report = ReconcileReport::default();
    let mut seen = HashSet::new();

    for def in persisted {
        let verdict = if !seen.insert(def.id.clone()) {
            Err("duplicate task id".to_string())
        } else if !scheduler.store().contains(&def.script_id) {
            Err(format!("script {} no longer exists", def.script_id))
        } else {
            CronSchedule::parse(&def.cron_expression).map_err(|e| e.to_string())
        };

        match verdict {
            Ok(schedule) => {
                scheduler.adopt(&mut state, def, schedule);
                report.armed += 1;
            }
            Err(reason) => {
                warn!(task_id = %def.id, script_id = %def.script_id, %reason, "dropping persisted task");
                report.dropped.push(DroppedTask { id: def.id, reason });
            }
        }
    }

    if !report.dropped.is_empty() {
        scheduler.db().save_tasks(state.defs())?;
    }

    info!(armed = report.armed, dropped = report.dropped.len(), "tasks reconciled");
    Ok(report)
}
