// Main entry point for the API server, job runner and scheduler

use std::sync::Arc;

use anyhow::{Context, Result};
use clipforge_core::domains::job_registry;
use clipforge_core::kernel::jobs::{JobRunner, JobRunnerConfig};
use clipforge_core::kernel::PublishScheduler;
use clipforge_core::server::{build_app, connect_database, production_deps, AppState};
use clipforge_core::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clipforge_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting clipforge server");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let pool = connect_database(&config).await?;
    let deps = production_deps(&config, pool.clone())?;

    // Job runner
    let shutdown = CancellationToken::new();
    let runner = JobRunner::new(
        deps.job_queue.clone(),
        Arc::new(job_registry()),
        deps.clone(),
        JobRunnerConfig {
            worker_count: config.worker_count,
            poll_interval: config.job_poll_interval,
            ..JobRunnerConfig::default()
        },
    );
    let runner_handle = runner.start(shutdown.clone());

    // Due scans
    let scheduler = PublishScheduler::start(deps.clone())
        .await
        .context("Failed to start scheduler")?;

    let app = build_app(AppState::new(deps, Some(pool)));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler did not stop cleanly");
    }
    runner_handle.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}
