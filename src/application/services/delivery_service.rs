//! Per-job delivery: render, transmit, apply the retry policy, persist.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use url::Url;

use crate::domain::entities::DeliveryJob;
use crate::domain::render::{RenderContext, render_message};
use crate::domain::repositories::{CampaignRepository, JobRepository, RecipientRepository};
use crate::domain::transmitter::{MailTransmitter, OutboundMessage};
use crate::error::AppError;

/// Attempt budget for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
}

impl RetryPolicy {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns true if a job that failed on attempt `attempts` goes back to the queue.
    pub fn should_requeue(&self, attempts: i32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Sent { message_id: String },
    Requeued { reason: String },
    Failed { reason: String },
}

/// Static inputs of every rendered message.
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    pub unsubscribe_base: Url,
    /// Sender used when the campaign message has no `from_email`.
    pub default_from_email: String,
    pub default_from_name: String,
}

enum PrepareError {
    /// Retrying cannot help (missing data, broken template).
    Terminal(String),
    /// Store hiccup while loading; subject to the retry policy.
    Transient(String),
}

/// Processes claimed delivery jobs.
///
/// Every path ends in a [`JobRepository::save`], so a job never stays in
/// `sending` unless the store itself is unreachable.
pub struct DeliveryService<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    jobs: Arc<J>,
    campaigns: Arc<C>,
    recipients: Arc<R>,
    transmitter: Arc<dyn MailTransmitter>,
    options: DeliveryOptions,
}

impl<J, C, R> DeliveryService<J, C, R>
where
    J: JobRepository,
    C: CampaignRepository,
    R: RecipientRepository,
{
    pub fn new(
        jobs: Arc<J>,
        campaigns: Arc<C>,
        recipients: Arc<R>,
        transmitter: Arc<dyn MailTransmitter>,
        options: DeliveryOptions,
    ) -> Self {
        Self {
            jobs,
            campaigns,
            recipients,
            transmitter,
            options,
        }
    }

    /// Renders and transmits a claimed job, then persists the result.
    ///
    /// - transmit success → `sent` with the transport message id
    /// - transmit failure → `queued` again while `attempts < max_attempts`,
    ///   otherwise `failed`; the transport error is stored verbatim
    /// - permanent transmit failure (e.g. unparseable address), render
    ///   failure or missing campaign/message/recipient → `failed`
    ///
    /// # Errors
    ///
    /// Returns the store error if the final `save` keeps failing after retries.
    pub async fn process(
        &self,
        mut job: DeliveryJob,
        retry: RetryPolicy,
    ) -> Result<JobOutcome, AppError> {
        let outcome = match self.prepare(&job).await {
            Ok(message) => match self.transmitter.send(message).await {
                Ok(message_id) => {
                    job.mark_sent(message_id.clone(), Utc::now());
                    JobOutcome::Sent { message_id }
                }
                Err(e) if e.is_permanent() => {
                    let reason = e.to_string();
                    job.fail(reason.clone(), Utc::now());
                    JobOutcome::Failed { reason }
                }
                Err(e) => Self::apply_failure(&mut job, e.to_string(), retry),
            },
            Err(PrepareError::Transient(reason)) => Self::apply_failure(&mut job, reason, retry),
            Err(PrepareError::Terminal(reason)) => {
                job.fail(reason.clone(), Utc::now());
                JobOutcome::Failed { reason }
            }
        };

        self.save(&job).await?;

        match &outcome {
            JobOutcome::Sent { message_id } => {
                metrics::counter!("dispatch_jobs_sent_total").increment(1);
                tracing::debug!(
                    job_id = job.id,
                    campaign_id = job.campaign_id,
                    message_id = %message_id,
                    "Job sent"
                );
            }
            JobOutcome::Requeued { reason } => {
                metrics::counter!("dispatch_jobs_requeued_total").increment(1);
                tracing::warn!(
                    job_id = job.id,
                    campaign_id = job.campaign_id,
                    attempt = job.attempts,
                    error = %reason,
                    "Delivery failed, job requeued"
                );
            }
            JobOutcome::Failed { reason } => {
                metrics::counter!("dispatch_jobs_failed_total").increment(1);
                tracing::error!(
                    job_id = job.id,
                    campaign_id = job.campaign_id,
                    attempt = job.attempts,
                    error = %reason,
                    "Delivery failed permanently"
                );
            }
        }

        Ok(outcome)
    }

    fn apply_failure(job: &mut DeliveryJob, reason: String, retry: RetryPolicy) -> JobOutcome {
        if retry.should_requeue(job.attempts) {
            job.requeue(reason.clone(), Utc::now());
            JobOutcome::Requeued { reason }
        } else {
            job.fail(reason.clone(), Utc::now());
            JobOutcome::Failed { reason }
        }
    }

    async fn prepare(&self, job: &DeliveryJob) -> Result<OutboundMessage, PrepareError> {
        let transient = |e: AppError| PrepareError::Transient(e.reason());

        let campaign = self
            .campaigns
            .find_by_id(job.campaign_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| {
                PrepareError::Terminal(format!("campaign {} not found", job.campaign_id))
            })?;

        let message = self
            .campaigns
            .find_message(job.campaign_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| {
                PrepareError::Terminal(format!("campaign {} has no message", job.campaign_id))
            })?;

        let recipient = self
            .recipients
            .find_by_id(job.recipient_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| {
                PrepareError::Terminal(format!("recipient {} not found", job.recipient_id))
            })?;

        let context = RenderContext::new(
            &recipient,
            &campaign,
            &message,
            Utc::now(),
            &self.options.unsubscribe_base,
        );
        let rendered = render_message(&context)
            .map_err(|e| PrepareError::Terminal(format!("render failed: {e}")))?;

        let (from_email, from_name) = if message.from_email.trim().is_empty() {
            (
                self.options.default_from_email.clone(),
                self.options.default_from_name.clone(),
            )
        } else {
            (message.from_email.clone(), message.from_name.clone())
        };

        Ok(OutboundMessage {
            from_email,
            from_name,
            to: recipient.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
            headers: BTreeMap::from([
                ("X-Campaign-ID".to_string(), campaign.id.to_string()),
                ("X-Subscriber-ID".to_string(), recipient.id.to_string()),
            ]),
        })
    }

    async fn save(&self, job: &DeliveryJob) -> Result<(), AppError> {
        // 50ms, 500ms, 2s
        let strategy = ExponentialBackoff::from_millis(10)
            .factor(5)
            .max_delay(Duration::from_secs(2))
            .take(3);

        Retry::spawn(strategy, || self.jobs.save(job))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    job_id = job.id,
                    status = %job.status,
                    error = %e,
                    "Failed to persist job state"
                );
            })
    }
}
