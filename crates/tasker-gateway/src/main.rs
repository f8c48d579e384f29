use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tasker_core::config::TaskerConfig;
use tasker_core::TaskRepository;
use tasker_exec::ShellRunner;
use tasker_scheduler::{Scheduler, SchedulerOptions, SystemClock};
use tasker_store::TaskStore;
use tracing::{info, warn};

mod app;
mod http;

/// Cron task scheduler with an HTTP management API.
#[derive(Parser, Debug)]
#[command(name = "tasker-gateway", version)]
struct Args {
    /// Config file path. Defaults to ~/.tasker/tasker.toml.
    #[arg(short, long, env = "TASKER_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tasker_gateway=info,tasker_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = TaskerConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        TaskerConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let store = Arc::new(TaskStore::open(db_path)?);

    let scheduler = Scheduler::new(
        Arc::clone(&store) as Arc<dyn TaskRepository>,
        SchedulerOptions::from(&config.scheduler),
        ShellRunner::from_config(&config.executor),
        Arc::new(SystemClock),
    )?;

    if config.scheduler.autostart {
        let armed = scheduler.start().await?;
        info!(armed, "scheduler autostarted");
    } else {
        info!("scheduler autostart disabled; POST /scheduler to start");
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, store, scheduler.clone()));
    let router = app::build_router(state);

    info!("Tasker gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    info!("Tasker gateway stopped");
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
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
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
