//! A single delivery worker: claim, throttle, deliver, repeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::services::{DeliveryService, RetryPolicy};
use crate::domain::rate_limiter::RateLimiter;
use crate::domain::repositories::{CampaignRepository, JobRepository, RecipientRepository};

/// Lifecycle of a worker: `Stopped → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Stopped,
    Running,
    Stopping,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct WorkerLoop<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    id: usize,
    jobs: Arc<J>,
    delivery: Arc<DeliveryService<J, C, R>>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    idle_backoff: Duration,
}

impl<J, C, R> WorkerLoop<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            worker_id = self.id,
            rate_per_minute = self.limiter.rate_per_minute(),
            "Mail worker started"
        );

        while !cancel.is_cancelled() {
            match self.jobs.claim_next().await {
                Ok(Some(job)) => {
                    metrics::counter!("dispatch_jobs_claimed_total").increment(1);
                    tracing::debug!(
                        worker_id = self.id,
                        job_id = job.id,
                        attempt = job.attempts,
                        "Job claimed"
                    );

                    // A claimed job is always carried through to its save,
                    // cancellation is only observed between jobs.
                    self.limiter.wait().await;

                    let job_id = job.id;
                    if let Err(e) = self.delivery.process(job, self.retry).await {
                        tracing::error!(
                            worker_id = self.id,
                            job_id,
                            error = %e,
                            "Job processing failed"
                        );
                    }
                }
                Ok(None) => {
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(worker_id = self.id, error = %e, "Failed to claim job");
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
            }
        }

        tracing::info!(worker_id = self.id, "Mail worker stopped");
    }

    /// Sleeps the idle backoff. Returns false if cancelled meanwhile.
    async fn idle(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            () = tokio::time::sleep(self.idle_backoff) => true,
            () = cancel.cancelled() => false,
        }
    }
}

/// Claims jobs from the shared queue and delivers them one at a time.
///
/// [`start`](Self::start) and [`stop`](Self::stop) are idempotent. `stop`
/// returns only after the background loop exited, by which point the job it
/// was working on has been saved.
pub struct MailWorker<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    worker_loop: Arc<WorkerLoop<J, C, R>>,
    running: Mutex<Option<Running>>,
    status: watch::Sender<WorkerStatus>,
}

impl<J, C, R> MailWorker<J, C, R>
where
    J: JobRepository + 'static,
    C: CampaignRepository + 'static,
    R: RecipientRepository + 'static,
{
    pub fn new(
        id: usize,
        jobs: Arc<J>,
        delivery: Arc<DeliveryService<J, C, R>>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        idle_backoff: Duration,
    ) -> Self {
        let (status, _) = watch::channel(WorkerStatus::Stopped);

        Self {
            worker_loop: Arc::new(WorkerLoop {
                id,
                jobs,
                delivery,
                limiter,
                retry,
                idle_backoff,
            }),
            running: Mutex::new(None),
            status,
        }
    }

    pub fn id(&self) -> usize {
        self.worker_loop.id
    }

    pub fn status(&self) -> WorkerStatus {
        *self.status.borrow()
    }

    /// Subscribes to status changes.
    pub fn watch_status(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    /// Spawns the claim loop. Returns false if the worker was already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let worker_loop = self.worker_loop.clone();
        let handle = tokio::spawn(async move { worker_loop.run(token).await });

        *running = Some(Running { cancel, handle });
        self.status.send_replace(WorkerStatus::Running);
        true
    }

    /// Signals the loop to exit without waiting for it.
    pub async fn request_stop(&self) {
        if let Some(running) = self.running.lock().await.as_ref() {
            running.cancel.cancel();
            self.status.send_replace(WorkerStatus::Stopping);
        }
    }

    /// Stops the loop and waits for it to exit. Returns false if the worker
    /// was not running.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(Running { cancel, handle }) = running.take() else {
            return false;
        };

        self.status.send_replace(WorkerStatus::Stopping);
        cancel.cancel();

        if let Err(e) = handle.await {
            tracing::error!(worker_id = self.id(), error = %e, "Mail worker task panicked");
        }

        self.status.send_replace(WorkerStatus::Stopped);
        true
    }
}
