//! Logging sink for scheduled-run reports.

use scriptd_registry::{RunOutcome, RunReport};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Drain the report channel until every sender is gone.
pub async fn run_sink(mut rx: mpsc::Receiver<RunReport>) {
    while let Some(report) = rx.recv().await {
        log_report(&report);
    }
}

fn log_report(report: &RunReport) {
    match &report.outcome {
        RunOutcome::Finished(result) if result.success() => info!(
            task_id = %report.task_id,
            script_id = %report.script_id,
            name = %report.script_name,
            fired_at = %report.fired_at,
            duration_ms = result.duration_ms,
            "scheduled run output:\n{}",
            result.output
        ),
        RunOutcome::Finished(result) => warn!(
            task_id = %report.task_id,
            script_id = %report.script_id,
            name = %report.script_name,
            exit_code = result.exit_code,
            "scheduled run failed:\n{}",
            result.output
        ),
        RunOutcome::Failed { code, message } => warn!(
            task_id = %report.task_id,
            script_id = %report.script_id,
            name = %report.script_name,
            code,
            "scheduled run could not start: {}",
            message
        ),
    }
}
