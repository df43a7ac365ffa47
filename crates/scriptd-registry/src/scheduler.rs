use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use scriptd_core::{ScriptId, TaskId};
use scriptd_executor::{RunRequest, ScriptRunner, TASK_ID_ENV};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::{RegistryError, Result};
use crate::schedule::CronSchedule;
use crate::store::ScriptStore;
use crate::timer::{self, Clock, TimerHandle};
use crate::types::{RunOutcome, RunReport, TaskDef, TaskSummary};

/// Shown in task listings when the owning script cannot be resolved.
pub const UNRESOLVED_SCRIPT_NAME: &str = "N/A";

/// Persisted task records plus the live timer for each.
#[derive(Default)]
pub(crate) struct TaskState {
    tasks: Vec<TaskDef>,
    timers: HashMap<TaskId, TimerHandle>,
}

impl TaskState {
    pub(crate) fn defs(&self) -> &[TaskDef] {
        &self.tasks
    }
}

fn lock_state(state: &Mutex<TaskState>) -> MutexGuard<'_, TaskState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns every task and its timer.
///
/// Lock order is tasks then scripts: the task mutex is taken first whenever
/// both collections are touched. Timers take the task mutex too when they
/// fire, so a stop made under it is final.
pub struct TaskScheduler {
    db: Arc<Database>,
    store: Arc<ScriptStore>,
    runner: Arc<dyn ScriptRunner>,
    /// If set, every firing's outcome is sent here (`try_send`, never blocks).
    reports: Option<mpsc::Sender<RunReport>>,
    clock: Clock,
    state: Arc<Mutex<TaskState>>,
}

impl TaskScheduler {
    /// Create an empty scheduler. Persisted tasks are brought back by
    /// [`reconcile`](crate::reconcile::reconcile).
    ///
    /// Servers pass [`Clock::System`]; paused-time tests pass
    /// [`Clock::tokio`].
    pub fn new(
        db: Arc<Database>,
        store: Arc<ScriptStore>,
        runner: Arc<dyn ScriptRunner>,
        reports: Option<mpsc::Sender<RunReport>>,
        clock: Clock,
    ) -> Self {
        Self {
            db,
            store,
            runner,
            reports,
            clock,
            state: Arc::new(Mutex::new(TaskState::default())),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TaskState> {
        lock_state(&self.state)
    }

    pub(crate) fn store(&self) -> &ScriptStore {
        &self.store
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Attach a cron expression to a script and arm its timer.
    pub fn create(&self, script_id: &ScriptId, cron_expression: &str) -> Result<TaskSummary> {
        if script_id.as_str().trim().is_empty() || cron_expression.trim().is_empty() {
            return Err(RegistryError::Validation(
                "scriptId and cronExpression are required".to_string(),
            ));
        }

        let mut state = self.lock();
        let script = self.store.get(script_id)?;
        let schedule = CronSchedule::parse(cron_expression)?;

        let def = TaskDef {
            id: TaskId::new(),
            script_id: script.id.clone(),
            cron_expression: schedule.expression().to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        state.tasks.push(def.clone());
        if let Err(e) = self.db.save_tasks(&state.tasks) {
            state.tasks.pop();
            return Err(e);
        }

        let handle = self.arm(&def, schedule);
        state.timers.insert(def.id.clone(), handle);

        if let Err(e) = self.store.set_cron_cache(&script.id, &def.cron_expression) {
            warn!(script_id = %script.id, error = %e, "failed to update cron cache");
        }

        info!(
            task_id = %def.id,
            script_id = %def.script_id,
            cron = %def.cron_expression,
            "task scheduled"
        );
        Ok(TaskSummary {
            id: def.id,
            script_id: def.script_id,
            script_name: script.name,
            cron_expression: def.cron_expression,
        })
    }

    pub fn list(&self) -> Vec<TaskSummary> {
        let state = self.lock();
        state
            .tasks
            .iter()
            .map(|t| TaskSummary {
                id: t.id.clone(),
                script_id: t.script_id.clone(),
                script_name: self
                    .store
                    .get(&t.script_id)
                    .map(|s| s.name)
                    .unwrap_or_else(|_| UNRESOLVED_SCRIPT_NAME.to_string()),
                cron_expression: t.cron_expression.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of timers currently armed.
    pub fn armed(&self) -> usize {
        self.lock().timers.len()
    }

    /// Stop a task's timer and forget the task.
    ///
    /// The shortened collection is persisted first. If that write fails the
    /// task stays listed and armed, and the database error is returned.
    pub fn delete(&self, id: &TaskId) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| RegistryError::TaskNotFound { id: id.to_string() })?;

        let mut remaining = state.tasks.clone();
        let removed = remaining.remove(index);
        self.db.save_tasks(&remaining)?;
        state.tasks = remaining;
        if let Some(handle) = state.timers.remove(id) {
            handle.stop();
        }

        let still_referenced = state.tasks.iter().any(|t| t.script_id == removed.script_id);
        if !still_referenced {
            if let Err(e) = self.store.set_cron_cache(&removed.script_id, "") {
                warn!(script_id = %removed.script_id, error = %e, "failed to clear cron cache");
            }
        }

        info!(task_id = %id, script_id = %removed.script_id, "task deleted");
        Ok(())
    }

    /// Stop and remove every task of `script_id`. Returns how many went.
    pub fn delete_all_for_script(&self, script_id: &ScriptId) -> Result<usize> {
        let mut state = self.lock();
        self.remove_for_script(&mut state, script_id)
    }

    /// Same as [`delete_all_for_script`](Self::delete_all_for_script) with
    /// the lock already held, so the caller can finish a cascade atomically.
    /// Nothing changes in memory unless the database write succeeds.
    pub(crate) fn remove_for_script(
        &self,
        state: &mut TaskState,
        script_id: &ScriptId,
    ) -> Result<usize> {
        let (doomed, kept): (Vec<TaskDef>, Vec<TaskDef>) = state
            .tasks
            .iter()
            .cloned()
            .partition(|t| &t.script_id == script_id);
        if doomed.is_empty() {
            return Ok(0);
        }

        self.db.save_tasks(&kept)?;
        state.tasks = kept;
        for def in &doomed {
            if let Some(handle) = state.timers.remove(&def.id) {
                handle.stop();
            }
        }

        info!(script_id = %script_id, count = doomed.len(), "tasks removed with script");
        Ok(doomed.len())
    }

    /// Re-arm a persisted task during reconciliation.
    pub(crate) fn adopt(&self, state: &mut TaskState, def: TaskDef, schedule: CronSchedule) {
        let handle = self.arm(&def, schedule);
        state.timers.insert(def.id.clone(), handle);
        state.tasks.push(def);
    }

    /// Stop every timer. Records stay persisted and are re-armed on the
    /// next start. Running processes are left alone.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let count = state.timers.len();
        for (_, handle) in state.timers.drain() {
            handle.stop();
        }
        info!(count, "scheduler stopped");
    }

    fn arm(&self, def: &TaskDef, schedule: CronSchedule) -> TimerHandle {
        let cancel = CancellationToken::new();
        let firing = self.firing(def, cancel.clone());
        timer::arm(schedule, self.clock, cancel, move |fired_at| firing.fire(fired_at))
    }

    fn firing(&self, def: &TaskDef, cancel: CancellationToken) -> Firing {
        Firing {
            task_id: def.id.clone(),
            script_id: def.script_id.clone(),
            store: Arc::clone(&self.store),
            runner: Arc::clone(&self.runner),
            reports: self.reports.clone(),
            state: Arc::clone(&self.state),
            cancel,
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        // Timers hold the shared state; stopping them releases it.
        for (_, handle) in self.lock().timers.drain() {
            handle.stop();
        }
    }
}

/// What a timer needs to launch its script.
struct Firing {
    task_id: TaskId,
    script_id: ScriptId,
    store: Arc<ScriptStore>,
    runner: Arc<dyn ScriptRunner>,
    reports: Option<mpsc::Sender<RunReport>>,
    state: Arc<Mutex<TaskState>>,
    cancel: CancellationToken,
}

impl Firing {
    /// Resolve the script now (it may have been renamed or edited since the
    /// task was created) and run it on a detached task.
    ///
    /// Runs under the task mutex: a delete that got the mutex first has
    /// already cancelled us, and one that comes later waits until the run
    /// is spawned.
    fn fire(&self, fired_at: DateTime<Utc>) {
        let _state = lock_state(&self.state);
        if self.cancel.is_cancelled() {
            debug!(task_id = %self.task_id, "timer stopped before firing");
            return;
        }

        let script = match self.store.get(&self.script_id) {
            Ok(script) => script,
            Err(e) => {
                warn!(task_id = %self.task_id, script_id = %self.script_id, "scheduled script no longer exists");
                publish(
                    &self.reports,
                    RunReport {
                        task_id: self.task_id.clone(),
                        script_id: self.script_id.clone(),
                        script_name: UNRESOLVED_SCRIPT_NAME.to_string(),
                        fired_at,
                        outcome: RunOutcome::Failed {
                            code: e.code(),
                            message: e.to_string(),
                        },
                    },
                );
                return;
            }
        };

        info!(task_id = %self.task_id, script_id = %script.id, name = %script.name, "task fired");

        let request = RunRequest::new(
            script.id.clone(),
            script.name.clone(),
            script.script_type,
            script.file_path.clone(),
        )
        .with_env(TASK_ID_ENV, self.task_id.as_str());
        let runner = Arc::clone(&self.runner);
        let reports = self.reports.clone();
        let task_id = self.task_id.clone();

        tokio::spawn(async move {
            let outcome = match runner.run(request).await {
                Ok(result) => {
                    if result.success() {
                        info!(task_id = %task_id, script_id = %script.id, duration_ms = result.duration_ms, "scheduled run finished");
                    } else {
                        warn!(task_id = %task_id, script_id = %script.id, exit_code = result.exit_code, "scheduled run exited non-zero");
                    }
                    RunOutcome::Finished(result)
                }
                Err(e) => {
                    error!(task_id = %task_id, script_id = %script.id, error = %e, "scheduled run failed");
                    RunOutcome::Failed {
                        code: e.code(),
                        message: e.to_string(),
                    }
                }
            };
            publish(
                &reports,
                RunReport {
                    task_id,
                    script_id: script.id,
                    script_name: script.name,
                    fired_at,
                    outcome,
                },
            );
        });
    }
}

fn publish(reports: &Option<mpsc::Sender<RunReport>>, report: RunReport) {
    if let Some(tx) = reports {
        if tx.try_send(report).is_err() {
            warn!("run report channel full or closed, report dropped");
        }
    }
}
