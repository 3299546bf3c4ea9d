//! PostgreSQL implementation of the delivery-job queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use crate::domain::entities::{DeliveryJob, JobStatus, JobStatusCounts, NewDeliveryJob};
use crate::domain::repositories::JobRepository;
use crate::error::AppError;

/// PostgreSQL repository backing the shared delivery queue.
///
/// Claims use `FOR UPDATE SKIP LOCKED` so any number of workers, in this
/// process or another one, can poll the same table without handing out a
/// job twice.
pub struct PgJobRepository {
    pool: Arc<PgPool>,
}

impl PgJobRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: i64,
    campaign_id: i64,
    recipient_id: i64,
    status: String,
    status_message: String,
    attempts: i32,
    sent_at: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    clicked_at: Option<DateTime<Utc>>,
    message_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for DeliveryJob {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<JobStatus>().map_err(|e| {
            AppError::internal(
                "Invalid job status in database",
                json!({ "job_id": row.id, "reason": e }),
            )
        })?;

        Ok(DeliveryJob {
            id: row.id,
            campaign_id: row.campaign_id,
            recipient_id: row.recipient_id,
            status,
            status_message: row.status_message,
            attempts: row.attempts,
            sent_at: row.sent_at,
            opened_at: row.opened_at,
            clicked_at: row.clicked_at,
            message_id: row.message_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn claim_next(&self) -> Result<Option<DeliveryJob>, AppError> {
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM delivery_jobs
            WHERE status = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            tx.rollback().await?;
            return Ok(None);
        };

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE delivery_jobs
            SET status = $2,
                attempts = attempts + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, campaign_id, recipient_id, status, status_message, attempts,
                      sent_at, opened_at, clicked_at, message_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(JobStatus::Sending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        DeliveryJob::try_from(row).map(Some)
    }

    async fn save(&self, job: &DeliveryJob) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE delivery_jobs
            SET status = $2,
                status_message = $3,
                attempts = $4,
                sent_at = $5,
                opened_at = $6,
                clicked_at = $7,
                message_id = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(&job.status_message)
        .bind(job.attempts)
        .bind(job.sent_at)
        .bind(job.opened_at)
        .bind(job.clicked_at)
        .bind(job.message_id.as_deref())
        .bind(job.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(
                "Delivery job not found",
                json!({ "job_id": job.id }),
            ));
        }

        Ok(())
    }

    async fn insert_batch(&self, jobs: Vec<NewDeliveryJob>) -> Result<u64, AppError> {
        if jobs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO delivery_jobs (campaign_id, recipient_id, status, attempts, created_at, updated_at) ",
        );
        builder.push_values(&jobs, |mut row, job| {
            row.push_bind(job.campaign_id)
                .push_bind(job.recipient_id)
                .push_bind(JobStatus::Queued.as_str())
                .push_bind(0_i32)
                .push_bind(job.created_at)
                .push_bind(job.created_at);
        });

        builder.push(" ON CONFLICT (campaign_id, recipient_id) DO NOTHING");

        let result = builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn count_by_status(
        &self,
        campaign_id: i64,
        statuses: &[JobStatus],
    ) -> Result<JobStatusCounts, AppError> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM delivery_jobs
            WHERE campaign_id = $1
              AND (cardinality($2::text[]) = 0 OR status = ANY($2))
            GROUP BY status
            "#,
        )
        .bind(campaign_id)
        .bind(names)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut counts = JobStatusCounts::new();
        for (status, count) in rows {
            let status = status.parse::<JobStatus>().map_err(|e| {
                AppError::internal(
                    "Invalid job status in database",
                    json!({ "campaign_id": campaign_id, "reason": e }),
                )
            })?;
            counts.set(status, count);
        }

        Ok(counts)
    }

    async fn mark_by_message_id(
        &self,
        message_id: &str,
        status: JobStatus,
        reason: &str,
    ) -> Result<Option<DeliveryJob>, AppError> {
        if !matches!(status, JobStatus::Bounced | JobStatus::Rejected) {
            return Err(AppError::bad_request(
                "Only bounced or rejected can be applied by message id",
                json!({ "status": status.as_str() }),
            ));
        }

        let eligible: Vec<String> = [JobStatus::Sent, JobStatus::Opened, JobStatus::Clicked]
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE delivery_jobs
            SET status = $2,
                status_message = $3,
                updated_at = NOW()
            WHERE message_id = $1
              AND status = ANY($4)
            RETURNING id, campaign_id, recipient_id, status, status_message, attempts,
                      sent_at, opened_at, clicked_at, message_id, created_at, updated_at
            "#,
        )
        .bind(message_id)
        .bind(status.as_str())
        .bind(reason)
        .bind(eligible)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(DeliveryJob::try_from).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DeliveryJob>, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, campaign_id, recipient_id, status, status_message, attempts,
                   sent_at, opened_at, clicked_at, message_id, created_at, updated_at
            FROM delivery_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(DeliveryJob::try_from).transpose()
    }
}
