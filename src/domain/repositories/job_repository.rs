//! Repository trait for delivery jobs: the persistent work queue.

use crate::domain::entities::{DeliveryJob, JobStatus, JobStatusCounts, NewDeliveryJob};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface over delivery-job records.
///
/// The store itself is the queue shared by all workers; [`claim_next`] is the
/// only coordination primitive between them.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgJobRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_job.rs`
///
/// [`claim_next`]: JobRepository::claim_next
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Atomically claims the oldest queued job.
    ///
    /// The job is moved to `sending` and its `attempts` incremented in the
    /// same transaction that selects it. Concurrent callers never receive the
    /// same job.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(job))` with the claimed job
    /// - `Ok(None)` if no job is queued
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn claim_next(&self) -> Result<Option<DeliveryJob>, AppError>;

    /// Persists the full job record (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the job does not exist.
    /// Returns [`AppError::Internal`] on database errors.
    async fn save(&self, job: &DeliveryJob) -> Result<(), AppError>;

    /// Inserts a batch of queued jobs in one transaction (all or nothing).
    ///
    /// A recipient that already has a job for the campaign is skipped, so a
    /// re-dispatched campaign never queues a second message. Returns the
    /// number of inserted rows.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if a referenced campaign or recipient
    /// does not exist. Returns [`AppError::Internal`] on database errors.
    async fn insert_batch(&self, jobs: Vec<NewDeliveryJob>) -> Result<u64, AppError>;

    /// Counts a campaign's jobs per status.
    ///
    /// Only `statuses` are counted; an empty slice counts every status.
    /// Statuses without jobs are absent from the result and read as zero.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn count_by_status(
        &self,
        campaign_id: i64,
        statuses: &[JobStatus],
    ) -> Result<JobStatusCounts, AppError>;

    /// Applies an external delivery signal to the job carrying `message_id`.
    ///
    /// Only jobs that were already handed to the transport (`sent`, `opened`,
    /// `clicked`) are affected.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(job))` with the updated job
    /// - `Ok(None)` if no eligible job carries the message id
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_by_message_id(
        &self,
        message_id: &str,
        status: JobStatus,
        reason: &str,
    ) -> Result<Option<DeliveryJob>, AppError>;

    /// Finds a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<DeliveryJob>, AppError>;
}
