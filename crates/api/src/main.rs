use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sponsorship_api::app::{create_app, AppState};
use sponsorship_api::config::Config;
use sponsorship_api::jobs::{ExpireInvitationsJob, JobScheduler};
use sponsorship_api::middleware::{init_metrics, logging::init_logging};
use tracing::info;

const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging);
    init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting sponsorship service v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations completed");

    let addr = config.socket_addr().context("Invalid server address")?;
    let jobs_config = config.jobs.clone();

    let state = AppState::new(config, pool).context("Failed to build application state")?;

    let mut scheduler = JobScheduler::new();
    if jobs_config.expiry_sweep_enabled {
        scheduler.register(ExpireInvitationsJob::new(
            Arc::clone(&state.service),
            jobs_config.expiry_sweep_interval_minutes,
            jobs_config.expiry_sweep_batch_size,
        ));
    }
    scheduler.start();

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
