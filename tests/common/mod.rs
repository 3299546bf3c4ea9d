#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub async fn create_contact(pool: &PgPool, email: &str, first_name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO contacts (email, first_name) VALUES ($1, $2) RETURNING id")
        .bind(email)
        .bind(first_name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn create_unsubscribed_contact(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO contacts (email, unsubscribed) VALUES ($1, TRUE) RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_deleted_contact(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO contacts (email, deleted_at) VALUES ($1, NOW()) RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_campaign(pool: &PgPool, name: &str, status: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO campaigns (name, status) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(status)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn create_campaign_at(
    pool: &PgPool,
    name: &str,
    status: &str,
    scheduled_at: DateTime<Utc>,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO campaigns (name, status, scheduled_at) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(status)
    .bind(scheduled_at)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_message(pool: &PgPool, campaign_id: i64, subject: &str, body: &str) {
    sqlx::query(
        "INSERT INTO campaign_messages (campaign_id, subject, body, from_email, from_name) \
         VALUES ($1, $2, $3, 'news@example.com', 'News')",
    )
    .bind(campaign_id)
    .bind(subject)
    .bind(body)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn add_to_audience(pool: &PgPool, campaign_id: i64, contact_id: i64) {
    sqlx::query("INSERT INTO campaign_audiences (campaign_id, contact_id) VALUES ($1, $2)")
        .bind(campaign_id)
        .bind(contact_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn create_job(
    pool: &PgPool,
    campaign_id: i64,
    recipient_id: i64,
    status: &str,
    created_at: DateTime<Utc>,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO delivery_jobs (campaign_id, recipient_id, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $4) RETURNING id",
    )
    .bind(campaign_id)
    .bind(recipient_id)
    .bind(status)
    .bind(created_at)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_sent_job(
    pool: &PgPool,
    campaign_id: i64,
    recipient_id: i64,
    message_id: &str,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO delivery_jobs (campaign_id, recipient_id, status, attempts, sent_at, message_id) \
         VALUES ($1, $2, 'sent', 1, NOW(), $3) RETURNING id",
    )
    .bind(campaign_id)
    .bind(recipient_id)
    .bind(message_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn campaign_status(pool: &PgPool, campaign_id: i64) -> (String, String) {
    sqlx::query_as("SELECT status, status_message FROM campaigns WHERE id = $1")
        .bind(campaign_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn job_count(pool: &PgPool, campaign_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM delivery_jobs WHERE campaign_id = $1")
        .bind(campaign_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
