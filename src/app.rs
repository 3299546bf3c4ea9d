//! Process wiring and lifecycle.
//!
//! Handles the database pool, migrations, transmitter selection, the
//! scheduler and worker pool, and OS signals.

use crate::application::services::{
    BounceService, CampaignService, DeliveryOptions, DeliveryService, NoopBounceSource,
};
use crate::config::{self, Config};
use crate::domain::transmitter::MailTransmitter;
use crate::infrastructure::mail::{LogTransmitter, SmtpTransmitter};
use crate::infrastructure::persistence::{
    PgCampaignRepository, PgJobRepository, PgRecipientRepository,
};
use crate::scheduler::CampaignScheduler;
use crate::workers::WorkerPool;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

type PgWorkerPool = WorkerPool<PgJobRepository, PgCampaignRepository, PgRecipientRepository>;

/// Runs the dispatch pipeline until SIGINT or SIGTERM.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - SMTP transmitter (or the logging one in dry-run mode)
/// - Worker pool and campaign scheduler
///
/// On `SIGHUP` the configuration is reloaded and the worker pool restarted
/// with the new worker settings. Scheduler cadences and the transport are
/// read only at startup.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - The SMTP transport cannot be built
/// - Signal handlers cannot be installed
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let transmitter: Arc<dyn MailTransmitter> = if config.smtp.dry_run {
        tracing::info!("Transmitter: dry run");
        Arc::new(LogTransmitter::new())
    } else {
        tracing::info!(host = %config.smtp.host, port = config.smtp.port, "Transmitter: SMTP");
        Arc::new(SmtpTransmitter::new(&config.smtp)?)
    };

    let pool = Arc::new(pool);
    let campaigns = Arc::new(PgCampaignRepository::new(pool.clone()));
    let jobs = Arc::new(PgJobRepository::new(pool.clone()));
    let recipients = Arc::new(PgRecipientRepository::new(pool.clone()));

    let delivery = Arc::new(DeliveryService::new(
        jobs.clone(),
        campaigns.clone(),
        recipients.clone(),
        transmitter,
        DeliveryOptions {
            unsubscribe_base: config.unsubscribe_base_url.clone(),
            default_from_email: config.smtp.from_addr.clone(),
            default_from_name: config.smtp.from_name.clone(),
        },
    ));

    let workers = Arc::new(WorkerPool::new(
        jobs.clone(),
        delivery,
        config.workers.clone(),
    ));

    let scheduler = CampaignScheduler::new(
        Arc::new(CampaignService::new(
            campaigns,
            recipients,
            jobs.clone(),
            config.job_batch_size,
        )),
        Arc::new(BounceService::new(jobs, Arc::new(NoopBounceSource))),
        workers.clone(),
        config.schedule.clone(),
    );

    scheduler.start().await;

    let waited = wait_for_shutdown(&workers).await;

    tracing::info!("Shutting down");
    scheduler.stop().await;
    pool.close().await;
    tracing::info!("Shutdown complete");

    waited
}

#[cfg(unix)]
async fn wait_for_shutdown(workers: &PgWorkerPool) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for SIGINT")?;
                tracing::info!("Received SIGINT");
                return Ok(());
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM");
                return Ok(());
            }
            _ = hangup.recv() => {
                tracing::info!("Received SIGHUP, reloading configuration");
                reload_workers(workers).await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_workers: &PgWorkerPool) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Received Ctrl-C");
    Ok(())
}

/// Re-reads the environment (and `.env`) and restarts the pool if the worker
/// settings changed. An invalid configuration keeps the current workers.
#[cfg_attr(not(unix), allow(dead_code))]
async fn reload_workers(workers: &PgWorkerPool) {
    dotenvy::dotenv_override().ok();

    let reloaded = match config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration reload failed, keeping current workers");
            return;
        }
    };

    if reloaded.workers == workers.settings().await {
        tracing::info!("Worker settings unchanged");
        return;
    }

    workers.restart(reloaded.workers).await;
    tracing::info!("Worker pool restarted with reloaded settings");
}
