//! In-memory collaborators for worker and scheduler tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde_json::json;
use url::Url;

use crate::application::services::{DeliveryOptions, DeliveryService};
use crate::domain::entities::{
    Campaign, CampaignMessage, CampaignStatus, DeliveryJob, JobStatus, JobStatusCounts,
    NewDeliveryJob, Recipient,
};
use crate::domain::repositories::{JobRepository, MockCampaignRepository, MockRecipientRepository};
use crate::domain::transmitter::{MailTransmitter, OutboundMessage, TransmitError};
use crate::error::AppError;

/// Job queue kept in a vector; claims are serialised by one mutex, which is
/// enough to model the store's atomic claim.
#[derive(Default)]
pub struct InMemoryJobs {
    jobs: Mutex<Vec<DeliveryJob>>,
    claims: Mutex<Vec<i64>>,
}

impl InMemoryJobs {
    /// Seeds `n` queued jobs for campaign 1 with ids `1..=n`, oldest first.
    pub fn with_queued(n: i64) -> Self {
        let base = Utc::now() - TimeDelta::seconds(n);
        let jobs = (1..=n)
            .map(|id| {
                let created_at = base + TimeDelta::seconds(id);
                DeliveryJob {
                    id,
                    campaign_id: 1,
                    recipient_id: id,
                    status: JobStatus::Queued,
                    status_message: String::new(),
                    attempts: 0,
                    sent_at: None,
                    opened_at: None,
                    clicked_at: None,
                    message_id: None,
                    created_at,
                    updated_at: created_at,
                }
            })
            .collect();

        Self {
            jobs: Mutex::new(jobs),
            claims: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, id: i64) -> Option<DeliveryJob> {
        self.jobs.lock().unwrap().iter().find(|job| job.id == id).cloned()
    }

    pub fn status_of(&self, id: i64) -> Option<JobStatus> {
        self.get(id).map(|job| job.status)
    }

    pub fn all(&self) -> Vec<DeliveryJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Ids in the order they were claimed.
    pub fn claims(&self) -> Vec<i64> {
        self.claims.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobs {
    async fn claim_next(&self) -> Result<Option<DeliveryJob>, AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let next = jobs
            .iter_mut()
            .filter(|job| job.status == JobStatus::Queued)
            .min_by_key(|job| (job.created_at, job.id));

        let Some(job) = next else {
            return Ok(None);
        };

        job.status = JobStatus::Sending;
        job.attempts += 1;
        job.updated_at = Utc::now();
        self.claims.lock().unwrap().push(job.id);

        Ok(Some(job.clone()))
    }

    async fn save(&self, job: &DeliveryJob) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
            .iter_mut()
            .find(|stored| stored.id == job.id)
            .ok_or_else(|| AppError::not_found("Delivery job not found", json!({ "job_id": job.id })))?;
        *stored = job.clone();
        Ok(())
    }

    async fn insert_batch(&self, new_jobs: Vec<NewDeliveryJob>) -> Result<u64, AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut next_id = jobs.iter().map(|job| job.id).max().unwrap_or(0);
        let mut count = 0;

        for new_job in new_jobs {
            let exists = jobs.iter().any(|job| {
                job.campaign_id == new_job.campaign_id && job.recipient_id == new_job.recipient_id
            });
            if exists {
                continue;
            }

            next_id += 1;
            count += 1;
            jobs.push(DeliveryJob {
                id: next_id,
                campaign_id: new_job.campaign_id,
                recipient_id: new_job.recipient_id,
                status: JobStatus::Queued,
                status_message: String::new(),
                attempts: 0,
                sent_at: None,
                opened_at: None,
                clicked_at: None,
                message_id: None,
                created_at: new_job.created_at,
                updated_at: new_job.created_at,
            });
        }

        Ok(count)
    }

    async fn count_by_status(
        &self,
        campaign_id: i64,
        statuses: &[JobStatus],
    ) -> Result<JobStatusCounts, AppError> {
        let mut counts = JobStatusCounts::new();
        for job in self.jobs.lock().unwrap().iter() {
            if job.campaign_id == campaign_id
                && (statuses.is_empty() || statuses.contains(&job.status))
            {
                counts.set(job.status, counts.get(job.status) + 1);
            }
        }
        Ok(counts)
    }

    async fn mark_by_message_id(
        &self,
        message_id: &str,
        status: JobStatus,
        reason: &str,
    ) -> Result<Option<DeliveryJob>, AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.iter_mut().find(|job| {
            job.message_id.as_deref() == Some(message_id)
                && matches!(
                    job.status,
                    JobStatus::Sent | JobStatus::Opened | JobStatus::Clicked
                )
        });

        Ok(job.map(|job| {
            job.status = status;
            job.status_message = reason.to_string();
            job.clone()
        }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DeliveryJob>, AppError> {
        Ok(self.get(id))
    }
}

/// Transmitter that counts calls and either succeeds or always fails.
pub struct TestTransmitter {
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl TestTransmitter {
    pub fn ok() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransmitter for TestTransmitter {
    async fn send(&self, message: OutboundMessage) -> Result<String, TransmitError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail {
            return Err(TransmitError::new("connection refused"));
        }

        Ok(format!("{call}.test@{}", message.to))
    }
}

pub fn test_campaign(id: i64, status: CampaignStatus) -> Campaign {
    let now = Utc::now();
    Campaign {
        id,
        name: format!("Campaign {id}"),
        status,
        status_message: String::new(),
        scheduled_at: None,
        queued_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Delivery service over `jobs` where every campaign and recipient exists.
pub fn delivery_service<T>(
    jobs: Arc<InMemoryJobs>,
    transmitter: Arc<T>,
) -> DeliveryService<InMemoryJobs, MockCampaignRepository, MockRecipientRepository>
where
    T: MailTransmitter + 'static,
{
    let mut campaigns = MockCampaignRepository::new();
    campaigns
        .expect_find_by_id()
        .returning(|id| Ok(Some(test_campaign(id, CampaignStatus::Queued))));
    campaigns.expect_find_message().returning(|campaign_id| {
        Ok(Some(CampaignMessage {
            campaign_id,
            subject: "Hello {{ recipient.first_name }}".to_string(),
            body: "<p>Hello</p>".to_string(),
            text_body: None,
            from_email: "news@example.com".to_string(),
            from_name: "News".to_string(),
        }))
    });

    let mut recipients = MockRecipientRepository::new();
    recipients.expect_find_by_id().returning(|id| {
        Ok(Some(Recipient::new(
            id,
            format!("r{id}@example.com"),
            "Ada",
            "",
        )))
    });

    DeliveryService::new(
        jobs,
        Arc::new(campaigns),
        Arc::new(recipients),
        transmitter,
        DeliveryOptions {
            unsubscribe_base: Url::parse("http://example.com/unsubscribe").unwrap(),
            default_from_email: "noreply@example.com".to_string(),
            default_from_name: "Broadcast".to_string(),
        },
    )
}
