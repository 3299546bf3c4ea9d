//! Campaign-level work of the scheduler: dispatching due campaigns and
//! detecting completion.

use std::sync::Arc;

use chrono::Utc;

use crate::application::services::CampaignJobFactory;
use crate::domain::entities::{Campaign, CampaignStatus, JobStatus};
use crate::domain::repositories::{CampaignRepository, JobRepository, RecipientRepository};
use crate::error::AppError;

/// Status message for a campaign without recipients.
pub const NO_CONTACTS_MESSAGE: &str = "No contacts to send to";

/// Result of dispatching one campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Another dispatcher moved the campaign out of `scheduled` first.
    Skipped,
    /// Recipient resolution or every job batch failed; campaign is `error`.
    Errored { reason: String },
    /// No recipients; campaign completed without jobs.
    Empty,
    /// Campaign `queued`. `existing` counts recipients that already had a job
    /// from an earlier dispatch and were not queued again.
    Queued {
        jobs: u64,
        existing: u64,
        failed_batches: usize,
    },
}

/// Counters of one dispatch tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub queued: usize,
    pub empty: usize,
    pub errored: usize,
    pub skipped: usize,
    pub jobs_created: u64,
}

/// Drives campaigns through `scheduled → processing → queued → completed | error`.
pub struct CampaignService<C, R, J>
where
    C: CampaignRepository,
    R: RecipientRepository,
    J: JobRepository,
{
    campaigns: Arc<C>,
    recipients: Arc<R>,
    jobs: Arc<J>,
    factory: CampaignJobFactory<J>,
    batch_size: usize,
}

impl<C, R, J> CampaignService<C, R, J>
where
    C: CampaignRepository,
    R: RecipientRepository,
    J: JobRepository,
{
    pub fn new(campaigns: Arc<C>, recipients: Arc<R>, jobs: Arc<J>, batch_size: usize) -> Self {
        Self {
            campaigns,
            recipients,
            factory: CampaignJobFactory::new(jobs.clone()),
            jobs,
            batch_size: batch_size.max(1),
        }
    }

    /// Dispatch tick: fans every due `scheduled` campaign into queued jobs.
    ///
    /// A failing campaign is logged and does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns the store error if the due campaigns cannot be listed.
    pub async fn dispatch_due(&self) -> Result<DispatchSummary, AppError> {
        let campaigns = self.campaigns.find_due(Utc::now()).await?;
        let mut summary = DispatchSummary::default();

        for campaign in &campaigns {
            match self.dispatch_campaign(campaign).await {
                Ok(DispatchOutcome::Queued { jobs, .. }) => {
                    summary.queued += 1;
                    summary.jobs_created += jobs;
                }
                Ok(DispatchOutcome::Empty) => summary.empty += 1,
                Ok(DispatchOutcome::Errored { .. }) => summary.errored += 1,
                Ok(DispatchOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    summary.errored += 1;
                    tracing::error!(
                        campaign_id = campaign.id,
                        error = %e,
                        code = e.code(),
                        details = %e.details(),
                        "Failed to dispatch campaign"
                    );
                }
            }
        }

        Ok(summary)
    }

    /// Dispatches a single campaign.
    ///
    /// Recipients are inserted in batches of `batch_size`. A failed batch is
    /// logged and the remaining batches still run; the shortfall is recorded
    /// in the campaign's status message. Recipients that already have a job
    /// (a rescheduled campaign) are not queued twice.
    ///
    /// # Errors
    ///
    /// Returns the store error of a campaign status write. A campaign left in
    /// `processing` this way needs `admin campaign reschedule`.
    pub async fn dispatch_campaign(&self, campaign: &Campaign) -> Result<DispatchOutcome, AppError> {
        if !self.campaigns.begin_processing(campaign.id).await? {
            tracing::debug!(campaign_id = campaign.id, "Campaign already taken, skipping");
            return Ok(DispatchOutcome::Skipped);
        }

        tracing::info!(campaign_id = campaign.id, name = %campaign.name, "Processing campaign");

        let recipients = match self.recipients.resolve_for_campaign(campaign.id).await {
            Ok(recipients) => recipients,
            Err(e) => {
                let reason = format!("Failed to resolve recipients: {}", e.reason());
                tracing::error!(
                    campaign_id = campaign.id,
                    error = %e,
                    code = e.code(),
                    details = %e.details(),
                    "Recipient resolution failed"
                );
                self.campaigns.mark_error(campaign.id, &reason).await?;
                return Ok(DispatchOutcome::Errored { reason });
            }
        };

        if recipients.is_empty() {
            self.campaigns
                .mark_completed(campaign.id, Utc::now(), NO_CONTACTS_MESSAGE)
                .await?;
            metrics::counter!("dispatch_campaigns_completed_total").increment(1);
            tracing::info!(campaign_id = campaign.id, "{NO_CONTACTS_MESSAGE}");
            return Ok(DispatchOutcome::Empty);
        }

        let total = recipients.len();
        let mut created: u64 = 0;
        let mut existing: u64 = 0;
        let mut failed_batches = 0;

        for (index, batch) in recipients.chunks(self.batch_size).enumerate() {
            match self.factory.create_jobs(campaign.id, batch).await {
                Ok(count) => {
                    created += count;
                    existing += (batch.len() as u64).saturating_sub(count);
                }
                Err(e) => {
                    failed_batches += 1;
                    tracing::warn!(
                        campaign_id = campaign.id,
                        batch = index,
                        batch_len = batch.len(),
                        error = %e,
                        "Failed to create job batch"
                    );
                }
            }
        }

        let queued = created + existing;

        if queued == 0 {
            let reason = format!("Failed to create jobs: all {failed_batches} batch(es) failed");
            self.campaigns.mark_error(campaign.id, &reason).await?;
            return Ok(DispatchOutcome::Errored { reason });
        }

        let mut message = if failed_batches == 0 {
            format!("Queued {queued} emails")
        } else {
            format!("Queued {queued} of {total} emails ({failed_batches} batch(es) failed)")
        };
        if existing > 0 {
            message.push_str(&format!(" ({existing} already had a job)"));
        }

        self.campaigns
            .mark_queued(campaign.id, Utc::now(), &message)
            .await?;
        metrics::counter!("dispatch_campaigns_queued_total").increment(1);
        tracing::info!(campaign_id = campaign.id, jobs = created, existing, "{message}");

        Ok(DispatchOutcome::Queued {
            jobs: created,
            existing,
            failed_batches,
        })
    }

    /// Stats tick: completes every campaign whose jobs all reached `sent` or `failed`.
    ///
    /// Already completed campaigns get their summary refreshed when it
    /// changed. Returns the number of campaigns completed by this tick.
    ///
    /// # Errors
    ///
    /// Returns the store error if the campaigns cannot be listed.
    pub async fn aggregate_stats(&self) -> Result<usize, AppError> {
        let campaigns = self
            .campaigns
            .find_by_status(&[
                CampaignStatus::Queued,
                CampaignStatus::Running,
                CampaignStatus::Completed,
            ])
            .await?;

        let mut completed = 0;

        for campaign in &campaigns {
            match self.complete_if_settled(campaign).await {
                Ok(true) => completed += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(
                    campaign_id = campaign.id,
                    error = %e,
                    code = e.code(),
                    details = %e.details(),
                    "Failed to aggregate campaign stats"
                ),
            }
        }

        Ok(completed)
    }

    async fn complete_if_settled(&self, campaign: &Campaign) -> Result<bool, AppError> {
        let counts = self
            .jobs
            .count_by_status(
                campaign.id,
                &[
                    JobStatus::Queued,
                    JobStatus::Sending,
                    JobStatus::Sent,
                    JobStatus::Failed,
                ],
            )
            .await?;

        if !counts.is_settled() {
            return Ok(false);
        }

        let message = format!(
            "Completed: {} sent, {} failed",
            counts.get(JobStatus::Sent),
            counts.get(JobStatus::Failed)
        );

        let already_completed = campaign.status == CampaignStatus::Completed;
        if already_completed && campaign.status_message == message {
            return Ok(false);
        }

        let moved = self
            .campaigns
            .mark_completed(campaign.id, Utc::now(), &message)
            .await?;

        if moved && !already_completed {
            metrics::counter!("dispatch_campaigns_completed_total").increment(1);
            tracing::info!(campaign_id = campaign.id, "{message}");
            return Ok(true);
        }

        Ok(false)
    }
}
