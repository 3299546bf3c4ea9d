//! Periodic driver of the dispatch pipeline.
//!
//! Three independent tasks, each on its own timer:
//!
//! | Task | Default cadence | Work |
//! |---|---|---|
//! | dispatch | 1 min | fan due campaigns into queued jobs |
//! | bounce | 15 min | apply bounce signals to sent jobs |
//! | stats | 1 h | complete campaigns whose jobs all settled |
//!
//! A task runs its tick to completion before waiting for the next one, and
//! ticks missed meanwhile are skipped, so one task never overlaps itself.
//! The tasks do not wait on each other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::services::{BounceService, CampaignService};
use crate::config::ScheduleSettings;
use crate::domain::repositories::{CampaignRepository, JobRepository, RecipientRepository};
use crate::workers::WorkerPool;

struct Tasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Owns the periodic tasks and the worker pool lifecycle.
pub struct CampaignScheduler<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    campaigns: Arc<CampaignService<C, R, J>>,
    bounces: Arc<BounceService<J>>,
    pool: Arc<WorkerPool<J, C, R>>,
    schedule: ScheduleSettings,
    tasks: Mutex<Option<Tasks>>,
}

impl<J, C, R> CampaignScheduler<J, C, R>
where
    J: JobRepository + 'static,
    C: CampaignRepository + 'static,
    R: RecipientRepository + 'static,
{
    pub fn new(
        campaigns: Arc<CampaignService<C, R, J>>,
        bounces: Arc<BounceService<J>>,
        pool: Arc<WorkerPool<J, C, R>>,
        schedule: ScheduleSettings,
    ) -> Self {
        Self {
            campaigns,
            bounces,
            pool,
            schedule,
            tasks: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool<J, C, R>> {
        &self.pool
    }

    /// Starts the worker pool and the three periodic tasks.
    ///
    /// Each task first fires one full interval after start. No-op if
    /// already started.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            return;
        }

        self.pool.start().await;

        let cancel = CancellationToken::new();

        let campaigns = self.campaigns.clone();
        let dispatch = spawn_periodic(
            "dispatch",
            self.schedule.dispatch_interval,
            cancel.clone(),
            move || {
                let campaigns = campaigns.clone();
                async move {
                    match campaigns.dispatch_due().await {
                        Ok(summary) if summary == Default::default() => {}
                        Ok(summary) => tracing::info!(
                            queued = summary.queued,
                            empty = summary.empty,
                            errored = summary.errored,
                            skipped = summary.skipped,
                            jobs_created = summary.jobs_created,
                            "Dispatch tick finished"
                        ),
                        Err(e) => tracing::error!(error = %e, code = e.code(), "Dispatch tick failed"),
                    }
                }
            },
        );

        let bounces = self.bounces.clone();
        let bounce = spawn_periodic(
            "bounce",
            self.schedule.bounce_interval,
            cancel.clone(),
            move || {
                let bounces = bounces.clone();
                async move {
                    if let Err(e) = bounces.reconcile().await {
                        tracing::error!(error = %e, code = e.code(), "Bounce tick failed");
                    }
                }
            },
        );

        let campaigns = self.campaigns.clone();
        let stats = spawn_periodic(
            "stats",
            self.schedule.stats_interval,
            cancel.clone(),
            move || {
                let campaigns = campaigns.clone();
                async move {
                    match campaigns.aggregate_stats().await {
                        Ok(0) => {}
                        Ok(completed) => tracing::info!(completed, "Stats tick finished"),
                        Err(e) => tracing::error!(error = %e, code = e.code(), "Stats tick failed"),
                    }
                }
            },
        );

        tracing::info!(
            dispatch = ?self.schedule.dispatch_interval,
            bounce = ?self.schedule.bounce_interval,
            stats = ?self.schedule.stats_interval,
            "Campaign scheduler started"
        );

        *tasks = Some(Tasks {
            cancel,
            handles: vec![dispatch, bounce, stats],
        });
    }

    /// Stops the periodic tasks (letting a running tick finish), then drains
    /// the worker pool. No-op if not started.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        let Some(Tasks { cancel, handles }) = tasks.take() else {
            return;
        };

        cancel.cancel();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduler task panicked");
            }
        }

        self.pool.stop().await;
        tracing::info!("Campaign scheduler stopped");
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = cancel.cancelled() => break,
            }

            tracing::debug!(task = name, "Scheduler tick");
            tick().await;
        }

        tracing::debug!(task = name, "Scheduler task exited");
    })
}
