//! Fan-out of a campaign's recipients into queued delivery jobs.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::entities::{NewDeliveryJob, Recipient};
use crate::domain::repositories::JobRepository;
use crate::error::AppError;

/// Creates one queued job per recipient.
///
/// Each call is one all-or-nothing insert; callers split large audiences into
/// fixed-size batches first.
pub struct CampaignJobFactory<J: JobRepository> {
    jobs: Arc<J>,
}

impl<J: JobRepository> CampaignJobFactory<J> {
    pub fn new(jobs: Arc<J>) -> Self {
        Self { jobs }
    }

    /// Inserts queued jobs for `recipients`, all sharing one creation timestamp.
    ///
    /// Returns the number of jobs created; recipients that already have a job
    /// for the campaign are not counted.
    ///
    /// # Errors
    ///
    /// Returns the store error; in that case no job of the batch was persisted.
    pub async fn create_jobs(
        &self,
        campaign_id: i64,
        recipients: &[Recipient],
    ) -> Result<u64, AppError> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let created_at = Utc::now();
        let jobs = recipients
            .iter()
            .map(|recipient| NewDeliveryJob {
                campaign_id,
                recipient_id: recipient.id,
                created_at,
            })
            .collect();

        self.jobs.insert_batch(jobs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockJobRepository;

    #[tokio::test]
    async fn test_create_jobs_one_per_recipient_with_shared_timestamp() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_insert_batch()
            .withf(|batch| {
                batch.len() == 3
                    && batch.iter().all(|job| job.campaign_id == 7)
                    && batch.iter().all(|job| job.created_at == batch[0].created_at)
                    && batch.iter().map(|job| job.recipient_id).eq([1, 2, 3])
            })
            .times(1)
            .returning(|batch| Ok(batch.len() as u64));

        let factory = CampaignJobFactory::new(Arc::new(jobs));
        let recipients: Vec<_> = (1..=3)
            .map(|id| Recipient::new(id, format!("r{id}@example.com"), "", ""))
            .collect();

        assert_eq!(factory.create_jobs(7, &recipients).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_create_jobs_skips_store_for_empty_batch() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_insert_batch().times(0);

        let factory = CampaignJobFactory::new(Arc::new(jobs));
        assert_eq!(factory.create_jobs(7, &[]).await.unwrap(), 0);
    }
}
