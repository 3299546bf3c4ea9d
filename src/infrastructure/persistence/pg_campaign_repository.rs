//! PostgreSQL implementation of campaign repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{Campaign, CampaignMessage, CampaignStatus};
use crate::domain::repositories::CampaignRepository;
use crate::error::AppError;

/// PostgreSQL repository for campaigns and their message templates.
///
/// Status writes are conditional `UPDATE`s filtered on the allowed
/// predecessor statuses; `rows_affected` tells the caller whether the
/// transition applied.
pub struct PgCampaignRepository {
    pool: Arc<PgPool>,
}

impl PgCampaignRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CampaignRow {
    id: i64,
    name: String,
    status: String,
    status_message: String,
    scheduled_at: Option<DateTime<Utc>>,
    queued_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = AppError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<CampaignStatus>().map_err(|e| {
            AppError::internal(
                "Invalid campaign status in database",
                json!({ "campaign_id": row.id, "reason": e }),
            )
        })?;

        Ok(Campaign {
            id: row.id,
            name: row.name,
            status,
            status_message: row.status_message,
            scheduled_at: row.scheduled_at,
            queued_at: row.queued_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRow {
    campaign_id: i64,
    subject: String,
    body: String,
    text_body: Option<String>,
    from_email: String,
    from_name: String,
}

impl From<MessageRow> for CampaignMessage {
    fn from(row: MessageRow) -> Self {
        CampaignMessage {
            campaign_id: row.campaign_id,
            subject: row.subject,
            body: row.body,
            text_body: row.text_body,
            from_email: row.from_email,
            from_name: row.from_name,
        }
    }
}

fn status_names(statuses: &[CampaignStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT id, name, status, status_message, scheduled_at, queued_at,
                   completed_at, created_at, updated_at
            FROM campaigns
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Campaign::try_from).transpose()
    }

    async fn find_by_status(
        &self,
        statuses: &[CampaignStatus],
    ) -> Result<Vec<Campaign>, AppError> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT id, name, status, status_message, scheduled_at, queued_at,
                   completed_at, created_at, updated_at
            FROM campaigns
            WHERE status = ANY($1)
              AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(status_names(statuses))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, AppError> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT id, name, status, status_message, scheduled_at, queued_at,
                   completed_at, created_at, updated_at
            FROM campaigns
            WHERE status = $1
              AND (scheduled_at IS NULL OR scheduled_at <= $2)
              AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(CampaignStatus::Scheduled.as_str())
        .bind(now)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn find_message(&self, campaign_id: i64) -> Result<Option<CampaignMessage>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT campaign_id, subject, body, text_body, from_email, from_name
            FROM campaign_messages
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(CampaignMessage::from))
    }

    async fn begin_processing(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2,
                status_message = '',
                updated_at = NOW()
            WHERE id = $1
              AND status = ANY($3)
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(CampaignStatus::Processing.as_str())
        .bind(status_names(&CampaignStatus::predecessors(
            CampaignStatus::Processing,
        )))
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_queued(
        &self,
        id: i64,
        queued_at: DateTime<Utc>,
        message: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2,
                status_message = $3,
                queued_at = COALESCE(queued_at, $4),
                updated_at = NOW()
            WHERE id = $1
              AND status = ANY($5)
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(CampaignStatus::Queued.as_str())
        .bind(message)
        .bind(queued_at)
        .bind(status_names(&[CampaignStatus::Processing]))
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_completed(
        &self,
        id: i64,
        completed_at: DateTime<Utc>,
        message: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2,
                status_message = $3,
                completed_at = COALESCE(completed_at, $4),
                updated_at = NOW()
            WHERE id = $1
              AND status = ANY($5)
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(CampaignStatus::Completed.as_str())
        .bind(message)
        .bind(completed_at)
        .bind(status_names(&CampaignStatus::predecessors(
            CampaignStatus::Completed,
        )))
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_error(&self, id: i64, message: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2,
                status_message = $3,
                updated_at = NOW()
            WHERE id = $1
              AND status = ANY($4)
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(CampaignStatus::Error.as_str())
        .bind(message)
        .bind(status_names(&CampaignStatus::predecessors(
            CampaignStatus::Error,
        )))
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reschedule(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2,
                status_message = 'Rescheduled by operator',
                updated_at = NOW()
            WHERE id = $1
              AND status = ANY($3)
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(CampaignStatus::Scheduled.as_str())
        .bind(status_names(&[
            CampaignStatus::Processing,
            CampaignStatus::Error,
        ]))
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
