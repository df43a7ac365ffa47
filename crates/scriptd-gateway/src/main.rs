use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use scriptd_core::ScriptdConfig;
use scriptd_executor::ProcessExecutor;
use scriptd_registry::{Clock, Database, Registry, RegistryOptions, RunReport};
use tokio::sync::mpsc;
use tracing::{info, warn};

mod app;
mod http;
mod report;

/// Script registry, runner and cron scheduler behind a small HTTP API.
#[derive(Parser, Debug)]
#[command(name = "scriptd", version)]
struct Args {
    /// Path to the TOML config file (default: ~/.scriptd/scriptd.toml).
    #[arg(short, long, env = "SCRIPTD_CONFIG")]
    config: Option<String>,

    /// Override `[server] bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `[server] port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scriptd_gateway=info,scriptd_registry=info,scriptd_executor=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let mut config = ScriptdConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        ScriptdConfig::default()
    });
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(path = %config.database.path, "opening SQLite database");
    let database = Database::open(Path::new(&config.database.path))?;

    let (report_tx, report_rx) = mpsc::channel::<RunReport>(config.scheduler.reports.max(1));
    let report_sink = tokio::spawn(report::run_sink(report_rx));

    let executor = ProcessExecutor::new(config.interpreters.clone());
    info!(
        shell = %config.interpreters.shell,
        node = %config.interpreters.node,
        python = %config.interpreters.python,
        "interpreters configured"
    );

    // Tasks are re-armed before the listener accepts anything.
    let (registry, reconciled) = Registry::open(RegistryOptions {
        database,
        scripts_root: config.storage.scripts.clone().into(),
        runner: Arc::new(executor),
        reports: Some(report_tx),
        clock: Clock::System,
    })
    .await?;
    info!(
        scripts = registry.script_count(),
        tasks = reconciled.armed,
        dropped = reconciled.dropped.len(),
        "registry ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(config, registry));
    let router = app::build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("scriptd listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Timers stop; records stay for the next start. Running scripts finish
    // on their own.
    state.registry.shutdown();
    drop(state);
    report_sink.abort();
    info!("shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
