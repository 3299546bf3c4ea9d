//! Repository trait for campaign lifecycle data.

use crate::domain::entities::{Campaign, CampaignMessage, CampaignStatus};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository interface for reading campaigns and driving their status.
///
/// Every status write is a guarded transition: the update only applies when
/// the stored status is a legal predecessor of the target status (see
/// [`CampaignStatus::can_transition_to`]). Transition methods return
/// `Ok(false)` when the guard did not match, so two dispatchers racing on the
/// same campaign cannot both move it.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgCampaignRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_campaign.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Finds a campaign by id, soft-deleted campaigns excluded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError>;

    /// Lists campaigns whose status is one of `statuses`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_status(&self, statuses: &[CampaignStatus])
    -> Result<Vec<Campaign>, AppError>;

    /// Lists `scheduled` campaigns whose `scheduled_at` is unset or not after `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, AppError>;

    /// Loads the message template of a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_message(&self, campaign_id: i64) -> Result<Option<CampaignMessage>, AppError>;

    /// `scheduled → processing`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn begin_processing(&self, id: i64) -> Result<bool, AppError>;

    /// `processing → queued`, setting `queued_at` and the status message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_queued(
        &self,
        id: i64,
        queued_at: DateTime<Utc>,
        message: &str,
    ) -> Result<bool, AppError>;

    /// Moves the campaign to `completed`.
    ///
    /// `completed_at` is only written on the first completion; later calls
    /// refresh the status message alone.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_completed(
        &self,
        id: i64,
        completed_at: DateTime<Utc>,
        message: &str,
    ) -> Result<bool, AppError>;

    /// Moves an in-flight campaign to `error` with the failure reason.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_error(&self, id: i64, message: &str) -> Result<bool, AppError>;

    /// Operator intervention: puts a `processing` or `error` campaign back to
    /// `scheduled` so the next dispatch tick picks it up again.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn reschedule(&self, id: i64) -> Result<bool, AppError>;
}
