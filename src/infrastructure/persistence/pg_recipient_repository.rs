//! PostgreSQL implementation of recipient repository.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::Recipient;
use crate::domain::repositories::RecipientRepository;
use crate::error::AppError;

/// PostgreSQL repository resolving campaign audiences from `contacts`.
pub struct PgRecipientRepository {
    pool: Arc<PgPool>,
}

impl PgRecipientRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RecipientRow {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
}

impl From<RecipientRow> for Recipient {
    fn from(row: RecipientRow) -> Self {
        Recipient::new(row.id, row.email, row.first_name, row.last_name)
    }
}

#[async_trait]
impl RecipientRepository for PgRecipientRepository {
    async fn resolve_for_campaign(&self, campaign_id: i64) -> Result<Vec<Recipient>, AppError> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT c.id, c.email, c.first_name, c.last_name
            FROM campaign_audiences a
            JOIN contacts c ON c.id = a.contact_id
            WHERE a.campaign_id = $1
              AND c.deleted_at IS NULL
              AND c.unsubscribed = FALSE
            ORDER BY c.id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Recipient::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Recipient>, AppError> {
        let row = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT id, email, first_name, last_name
            FROM contacts
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Recipient::from))
    }
}
