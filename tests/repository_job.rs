mod common;

use broadcast_dispatch::AppError;
use broadcast_dispatch::domain::entities::{JobStatus, NewDeliveryJob};
use broadcast_dispatch::domain::repositories::JobRepository;
use broadcast_dispatch::infrastructure::persistence::PgJobRepository;
use chrono::{TimeDelta, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;

#[sqlx::test]
async fn test_claim_next_takes_oldest_queued_job(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "FIFO", "queued").await;
    let a = common::create_contact(&pool, "a@example.com", "A").await;
    let b = common::create_contact(&pool, "b@example.com", "B").await;

    let now = Utc::now();
    let newer = common::create_job(&pool, campaign, a, "queued", now).await;
    let older = common::create_job(&pool, campaign, b, "queued", now - TimeDelta::minutes(5)).await;

    let repo = PgJobRepository::new(Arc::new(pool));

    let first = repo.claim_next().await.unwrap().unwrap();
    assert_eq!(first.id, older);
    assert_eq!(first.status, JobStatus::Sending);
    assert_eq!(first.attempts, 1);

    let second = repo.claim_next().await.unwrap().unwrap();
    assert_eq!(second.id, newer);

    assert!(repo.claim_next().await.unwrap().is_none());
}

#[sqlx::test]
async fn test_claim_next_skips_non_queued_jobs(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Skip", "queued").await;
    let a = common::create_contact(&pool, "a@example.com", "A").await;
    let b = common::create_contact(&pool, "b@example.com", "B").await;
    let now = Utc::now();
    common::create_job(&pool, campaign, a, "sending", now).await;
    common::create_job(&pool, campaign, b, "failed", now).await;

    let repo = PgJobRepository::new(Arc::new(pool));

    assert!(repo.claim_next().await.unwrap().is_none());
}

#[sqlx::test]
async fn test_concurrent_claims_are_exclusive(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Concurrent", "queued").await;
    let now = Utc::now();
    for i in 0..40 {
        let contact = common::create_contact(&pool, &format!("c{i}@example.com"), "C").await;
        common::create_job(&pool, campaign, contact, "queued", now + TimeDelta::milliseconds(i)).await;
    }

    let repo = Arc::new(PgJobRepository::new(Arc::new(pool)));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = repo.claim_next().await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }

    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(all.len(), 40);
    assert_eq!(unique.len(), 40);
}

#[sqlx::test]
async fn test_save_persists_outcome(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Save", "queued").await;
    let contact = common::create_contact(&pool, "s@example.com", "S").await;
    common::create_job(&pool, campaign, contact, "queued", Utc::now()).await;

    let repo = PgJobRepository::new(Arc::new(pool));

    let mut job = repo.claim_next().await.unwrap().unwrap();
    job.mark_sent("1.abc@example.com".to_string(), Utc::now());
    repo.save(&job).await.unwrap();

    let stored = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Sent);
    assert_eq!(stored.message_id.as_deref(), Some("1.abc@example.com"));
    assert!(stored.sent_at.is_some());
    assert_eq!(stored.attempts, 1);
}

#[sqlx::test]
async fn test_save_unknown_job_is_not_found(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Gone", "queued").await;
    let contact = common::create_contact(&pool, "g@example.com", "G").await;
    common::create_job(&pool, campaign, contact, "queued", Utc::now()).await;

    let repo = PgJobRepository::new(Arc::new(pool));

    let mut job = repo.claim_next().await.unwrap().unwrap();
    job.id += 1000;

    let result = repo.save(&job).await;
    assert!(matches!(result, Err(AppError::NotFound { .. })));
}

#[sqlx::test]
async fn test_insert_batch_creates_queued_jobs(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Batch", "processing").await;
    let a = common::create_contact(&pool, "a@example.com", "A").await;
    let b = common::create_contact(&pool, "b@example.com", "B").await;

    let repo = PgJobRepository::new(Arc::new(pool.clone()));
    let now = Utc::now();

    let inserted = repo
        .insert_batch(vec![
            NewDeliveryJob { campaign_id: campaign, recipient_id: a, created_at: now },
            NewDeliveryJob { campaign_id: campaign, recipient_id: b, created_at: now },
        ])
        .await
        .unwrap();

    assert_eq!(inserted, 2);

    let counts = repo.count_by_status(campaign, &[]).await.unwrap();
    assert_eq!(counts.get(JobStatus::Queued), 2);
    assert_eq!(counts.pipeline_total(), 2);
}

#[sqlx::test]
async fn test_insert_batch_is_all_or_nothing(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Atomic", "processing").await;
    let a = common::create_contact(&pool, "a@example.com", "A").await;

    let repo = PgJobRepository::new(Arc::new(pool.clone()));
    let now = Utc::now();

    // The second recipient does not exist, so the foreign key rejects the batch.
    let result = repo
        .insert_batch(vec![
            NewDeliveryJob { campaign_id: campaign, recipient_id: a, created_at: now },
            NewDeliveryJob { campaign_id: campaign, recipient_id: a + 1000, created_at: now },
        ])
        .await;

    assert!(result.is_err());
    assert_eq!(common::job_count(&pool, campaign).await, 0);
}

#[sqlx::test]
async fn test_insert_batch_skips_recipients_with_a_job(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Again", "processing").await;
    let a = common::create_contact(&pool, "a@example.com", "A").await;
    let b = common::create_contact(&pool, "b@example.com", "B").await;
    common::create_sent_job(&pool, campaign, a, "1.abc@example.com").await;

    let repo = PgJobRepository::new(Arc::new(pool.clone()));
    let now = Utc::now();

    let inserted = repo
        .insert_batch(vec![
            NewDeliveryJob { campaign_id: campaign, recipient_id: a, created_at: now },
            NewDeliveryJob { campaign_id: campaign, recipient_id: b, created_at: now },
        ])
        .await
        .unwrap();

    assert_eq!(inserted, 1);
    assert_eq!(common::job_count(&pool, campaign).await, 2);

    let counts = repo.count_by_status(campaign, &[]).await.unwrap();
    assert_eq!(counts.get(JobStatus::Sent), 1);
    assert_eq!(counts.get(JobStatus::Queued), 1);
}

#[sqlx::test]
async fn test_insert_empty_batch_is_noop(pool: PgPool) {
    let repo = PgJobRepository::new(Arc::new(pool));

    assert_eq!(repo.insert_batch(Vec::new()).await.unwrap(), 0);
}

#[sqlx::test]
async fn test_count_by_status_filters(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Counts", "queued").await;
    let other = common::create_campaign(&pool, "Other", "queued").await;
    let now = Utc::now();

    for (i, status) in ["queued", "queued", "sent", "failed", "bounced"].into_iter().enumerate() {
        let contact = common::create_contact(&pool, &format!("c{i}@example.com"), "C").await;
        common::create_job(&pool, campaign, contact, status, now).await;
    }
    let contact = common::create_contact(&pool, "other@example.com", "O").await;
    common::create_job(&pool, other, contact, "queued", now).await;

    let repo = PgJobRepository::new(Arc::new(pool));

    let all = repo.count_by_status(campaign, &[]).await.unwrap();
    assert_eq!(all.get(JobStatus::Queued), 2);
    assert_eq!(all.get(JobStatus::Sent), 1);
    assert_eq!(all.get(JobStatus::Failed), 1);
    assert_eq!(all.get(JobStatus::Bounced), 1);
    assert_eq!(all.pipeline_total(), 4);
    assert!(!all.is_settled());

    let settled = repo
        .count_by_status(campaign, &[JobStatus::Sent, JobStatus::Failed])
        .await
        .unwrap();
    assert_eq!(settled.get(JobStatus::Sent), 1);
    assert_eq!(settled.get(JobStatus::Queued), 0);
}

#[sqlx::test]
async fn test_mark_by_message_id_bounces_sent_job(pool: PgPool) {
    let campaign = common::create_campaign(&pool, "Bounce", "queued").await;
    let contact = common::create_contact(&pool, "b@example.com", "B").await;
    let id = common::create_sent_job(&pool, campaign, contact, "42.abc@example.com").await;

    let repo = PgJobRepository::new(Arc::new(pool));

    let job = repo
        .mark_by_message_id("42.abc@example.com", JobStatus::Bounced, "mailbox full")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Bounced);
    assert_eq!(job.status_message, "mailbox full");

    // Already bounced: nothing left to mark.
    let again = repo
        .mark_by_message_id("42.abc@example.com", JobStatus::Rejected, "spam")
        .await
        .unwrap();
    assert!(again.is_none());
}

#[sqlx::test]
async fn test_mark_by_message_id_unknown_id(pool: PgPool) {
    let repo = PgJobRepository::new(Arc::new(pool));

    let job = repo
        .mark_by_message_id("missing@example.com", JobStatus::Bounced, "")
        .await
        .unwrap();

    assert!(job.is_none());
}

#[sqlx::test]
async fn test_mark_by_message_id_rejects_pipeline_status(pool: PgPool) {
    let repo = PgJobRepository::new(Arc::new(pool));

    let result = repo
        .mark_by_message_id("x@example.com", JobStatus::Queued, "")
        .await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
}
