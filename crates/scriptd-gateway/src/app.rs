use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use scriptd_core::ScriptdConfig;
use scriptd_registry::Registry;

use crate::http;

/// Uploads and inline content share this ceiling.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: ScriptdConfig,
    pub registry: Registry,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ScriptdConfig, registry: Registry) -> Self {
        Self {
            config,
            registry,
            started_at: Instant::now(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route(
            "/api/scripts",
            get(http::scripts::list_scripts).post(http::scripts::create_script),
        )
        .route("/api/scripts/upload", post(http::scripts::upload_script))
        .route("/api/scripts/{id}/content", get(http::scripts::script_content))
        .route(
            "/api/scripts/{id}",
            put(http::scripts::update_script).delete(http::scripts::delete_script),
        )
        .route("/api/scripts/{id}/run", post(http::scripts::run_script))
        .route(
            "/api/tasks",
            get(http::tasks::list_tasks).post(http::tasks::create_task),
        )
        .route(
            "/api/tasks/{id}",
            axum::routing::delete(http::tasks::delete_task),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use scriptd_core::config::InterpreterConfig;
    use scriptd_core::ScriptdConfig;
    use scriptd_executor::ProcessExecutor;
    use scriptd_registry::{Clock, Database, Registry, RegistryOptions};

    use super::AppState;

    /// Registry on a temp dir with `/bin/sh` as the shell interpreter.
    pub async fn state(dir: &std::path::Path) -> Arc<AppState> {
        let interpreters = InterpreterConfig {
            shell: "/bin/sh".to_string(),
            ..InterpreterConfig::default()
        };
        let (registry, _) = Registry::open(RegistryOptions {
            database: Database::in_memory().unwrap(),
            scripts_root: dir.join("scripts"),
            runner: Arc::new(ProcessExecutor::new(interpreters)),
            reports: None,
            clock: Clock::System,
        })
        .await
        .unwrap();
        Arc::new(AppState::new(ScriptdConfig::default(), registry))
    }
}
