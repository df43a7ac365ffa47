use std::path::PathBuf;
use std::sync::Arc;

use scriptd_core::{ScriptId, TaskId};
use scriptd_executor::{RunRequest, RunResult, ScriptRunner};
use tokio::sync::mpsc;
use tracing::info;

use crate::db::Database;
use crate::error::Result;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::scheduler::TaskScheduler;
use crate::store::ScriptStore;
use crate::timer::Clock;
use crate::types::{
    DeletedScript, NewScript, RunReport, Script, ScriptContent, ScriptSummary, ScriptUpdate,
    TaskSummary,
};

/// Everything [`Registry::open`] needs.
pub struct RegistryOptions {
    pub database: Database,
    /// Directory holding the payload files.
    pub scripts_root: PathBuf,
    pub runner: Arc<dyn ScriptRunner>,
    /// Sink for scheduled-run outcomes.
    pub reports: Option<mpsc::Sender<RunReport>>,
    /// Time source for cron timers; `Clock::System` outside tests.
    pub clock: Clock,
}

/// The public face of the subsystem: scripts, tasks, and manual runs.
pub struct Registry {
    store: Arc<ScriptStore>,
    scheduler: TaskScheduler,
    runner: Arc<dyn ScriptRunner>,
}

impl Registry {
    /// Load persisted scripts, then reconcile and re-arm persisted tasks.
    ///
    /// Must run inside a tokio runtime; timers are spawned here.
    pub async fn open(options: RegistryOptions) -> Result<(Self, ReconcileReport)> {
        let db = Arc::new(options.database);
        let store = Arc::new(ScriptStore::open(Arc::clone(&db), options.scripts_root)?);
        let persisted = db.load_tasks()?;
        let scheduler = TaskScheduler::new(
            Arc::clone(&db),
            Arc::clone(&store),
            Arc::clone(&options.runner),
            options.reports,
            options.clock,
        );
        let report = reconcile(&scheduler, persisted)?;

        Ok((
            Self {
                store,
                scheduler,
                runner: options.runner,
            },
            report,
        ))
    }

    // -- scripts --------------------------------------------------------------

    pub fn create_script(&self, new: NewScript) -> Result<Script> {
        self.store.create(new)
    }

    pub fn list_scripts(&self) -> Vec<ScriptSummary> {
        self.store.list_summaries()
    }

    pub fn get_script(&self, id: &ScriptId) -> Result<Script> {
        self.store.get(id)
    }

    pub fn script_content(&self, id: &ScriptId) -> Result<ScriptContent> {
        self.store.get_content(id)
    }

    pub fn update_script(&self, id: &ScriptId, update: ScriptUpdate) -> Result<Script> {
        self.store.update(id, update)
    }

    /// Delete a script together with every task that points at it.
    ///
    /// The task lock is held for the whole cascade, so no task can be
    /// attached to the script between its tasks going and the record going.
    pub fn delete_script(&self, id: &ScriptId) -> Result<DeletedScript> {
        let mut tasks = self.scheduler.lock();
        self.store.get(id)?;
        let tasks_removed = self.scheduler.remove_for_script(&mut tasks, id)?;
        let deleted = self.store.delete(id)?;
        Ok(DeletedScript {
            tasks_removed,
            ..deleted
        })
    }

    /// Run a script now and wait for it to finish.
    pub async fn run_script(&self, id: &ScriptId) -> Result<RunResult> {
        let script = self.store.get(id)?;
        info!(script_id = %script.id, name = %script.name, "manual run requested");
        let request = RunRequest::new(script.id, script.name, script.script_type, script.file_path);
        Ok(self.runner.run(request).await?)
    }

    // -- tasks ----------------------------------------------------------------

    pub fn create_task(&self, script_id: &ScriptId, cron_expression: &str) -> Result<TaskSummary> {
        self.scheduler.create(script_id, cron_expression)
    }

    pub fn list_tasks(&self) -> Vec<TaskSummary> {
        self.scheduler.list()
    }

    pub fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.scheduler.delete(id)
    }

    // -- lifecycle ------------------------------------------------------------

    pub fn script_count(&self) -> usize {
        self.store.len()
    }

    pub fn task_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Stop all timers. Persisted tasks survive and are re-armed on reopen.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}
