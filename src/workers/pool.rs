//! Fixed-size set of mail workers started and stopped as a unit.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::mail_worker::MailWorker;
use crate::application::services::{DeliveryService, RetryPolicy};
use crate::config::WorkerSettings;
use crate::domain::rate_limiter::RateLimiter;
use crate::domain::repositories::{CampaignRepository, JobRepository, RecipientRepository};

struct PoolState<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    settings: WorkerSettings,
    workers: Vec<MailWorker<J, C, R>>,
}

/// Owns the mail workers of this process.
///
/// The global rate is split evenly: each worker gets its own limiter at
/// `max(rate_limit / worker_count, 1)` deliveries per minute.
///
/// One lock guards every transition and is held until the transition is
/// complete, so [`restart`](Self::restart) fully drains the old generation
/// before the new one starts.
pub struct WorkerPool<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    jobs: Arc<J>,
    delivery: Arc<DeliveryService<J, C, R>>,
    state: Mutex<PoolState<J, C, R>>,
}

impl<J, C, R> WorkerPool<J, C, R>
where
    J: JobRepository + 'static,
    C: CampaignRepository + 'static,
    R: RecipientRepository + 'static,
{
    pub fn new(
        jobs: Arc<J>,
        delivery: Arc<DeliveryService<J, C, R>>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            jobs,
            delivery,
            state: Mutex::new(PoolState {
                settings,
                workers: Vec::new(),
            }),
        }
    }

    /// Starts all workers. No-op if the pool is already running.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state).await;
    }

    /// Stops all workers and waits until every one of them exited.
    /// No-op if the pool is not running.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        Self::stop_locked(&mut state).await;
    }

    /// Stops the current workers, then starts a new set built from `settings`.
    pub async fn restart(&self, settings: WorkerSettings) {
        let mut state = self.state.lock().await;
        Self::stop_locked(&mut state).await;
        state.settings = settings;
        self.start_locked(&mut state).await;
    }

    pub async fn is_running(&self) -> bool {
        !self.state.lock().await.workers.is_empty()
    }

    /// Number of running workers.
    pub async fn worker_count(&self) -> usize {
        self.state.lock().await.workers.len()
    }

    pub async fn settings(&self) -> WorkerSettings {
        self.state.lock().await.settings.clone()
    }

    async fn start_locked(&self, state: &mut PoolState<J, C, R>) {
        if !state.workers.is_empty() {
            tracing::debug!("Worker pool already running");
            return;
        }

        let settings = &state.settings;
        let rate = settings.per_worker_rate();
        let retry = RetryPolicy::new(settings.max_attempts);

        let workers: Vec<_> = (0..settings.worker_count)
            .map(|id| {
                MailWorker::new(
                    id,
                    self.jobs.clone(),
                    self.delivery.clone(),
                    RateLimiter::per_minute(rate),
                    retry,
                    settings.idle_backoff,
                )
            })
            .collect();

        for worker in &workers {
            worker.start().await;
        }

        tracing::info!(
            workers = workers.len(),
            rate_per_worker = rate,
            max_attempts = retry.max_attempts,
            "Worker pool started"
        );

        state.workers = workers;
    }

    async fn stop_locked(state: &mut PoolState<J, C, R>) {
        if state.workers.is_empty() {
            return;
        }

        // Signal everyone first so in-flight jobs finish in parallel.
        for worker in &state.workers {
            worker.request_stop().await;
        }
        for worker in &state.workers {
            worker.stop().await;
        }

        tracing::info!(workers = state.workers.len(), "Worker pool stopped");
        state.workers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::JobStatus;
    use crate::domain::repositories::{MockCampaignRepository, MockRecipientRepository};
    use crate::workers::test_support::{InMemoryJobs, TestTransmitter, delivery_service};
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    type TestPool = WorkerPool<InMemoryJobs, MockCampaignRepository, MockRecipientRepository>;

    fn settings(worker_count: usize) -> WorkerSettings {
        WorkerSettings {
            worker_count,
            rate_limit: 600_000,
            max_attempts: 3,
            idle_backoff: Duration::from_millis(10),
        }
    }

    fn pool(jobs: Arc<InMemoryJobs>, transmitter: Arc<TestTransmitter>, workers: usize) -> TestPool {
        WorkerPool::new(
            jobs.clone(),
            Arc::new(delivery_service(jobs, transmitter)),
            settings(workers),
        )
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_workers_never_claim_the_same_job() {
        let jobs = Arc::new(InMemoryJobs::with_queued(50));
        let transmitter = Arc::new(TestTransmitter::ok());
        let pool = pool(jobs.clone(), transmitter.clone(), 4);

        pool.start().await;
        wait_until(|| jobs.all().iter().all(|job| job.status == JobStatus::Sent)).await;
        pool.stop().await;

        let claims = jobs.claims();
        let unique: HashSet<_> = claims.iter().collect();
        assert_eq!(claims.len(), 50);
        assert_eq!(unique.len(), 50);
        assert_eq!(transmitter.calls(), 50);
        assert!(jobs.all().iter().all(|job| job.attempts == 1));
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let jobs = Arc::new(InMemoryJobs::default());
        let pool = pool(jobs, Arc::new(TestTransmitter::ok()), 3);

        pool.stop().await;
        assert!(!pool.is_running().await);

        pool.start().await;
        pool.start().await;
        assert_eq!(pool.worker_count().await, 3);

        pool.stop().await;
        pool.stop().await;
        assert_eq!(pool.worker_count().await, 0);
    }

    #[tokio::test]
    async fn test_restart_replaces_generation() {
        let jobs = Arc::new(InMemoryJobs::default());
        let pool = pool(jobs, Arc::new(TestTransmitter::ok()), 2);

        pool.start().await;
        pool.restart(settings(5)).await;

        assert_eq!(pool.worker_count().await, 5);
        assert_eq!(pool.settings().await.worker_count, 5);

        pool.stop().await;
    }

    #[tokio::test]
    async fn test_stop_drains_in_flight_jobs() {
        let jobs = Arc::new(InMemoryJobs::with_queued(3));
        let transmitter =
            Arc::new(TestTransmitter::ok().with_delay(Duration::from_millis(150)));
        let pool = pool(jobs.clone(), transmitter.clone(), 3);

        pool.start().await;
        wait_until(|| transmitter.calls() == 3).await;
        pool.stop().await;

        assert!(
            jobs.all()
                .iter()
                .all(|job| job.status == JobStatus::Sent)
        );
    }

    #[tokio::test]
    async fn test_failing_jobs_settle_as_failed_after_three_attempts() {
        let jobs = Arc::new(InMemoryJobs::with_queued(5));
        let transmitter = Arc::new(TestTransmitter::failing());
        let pool = pool(jobs.clone(), transmitter.clone(), 2);

        pool.start().await;
        wait_until(|| jobs.all().iter().all(|job| job.status == JobStatus::Failed)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        pool.stop().await;

        assert!(jobs.all().iter().all(|job| job.attempts == 3));
        assert_eq!(transmitter.calls(), 15);
    }
}
