//! Bounce reconciliation: applies external delivery signals to sent jobs.
//!
//! No inbound source (IMAP, POP3, provider webhook) ships with the service;
//! [`NoopBounceSource`] is wired by default and the `admin bounce` command
//! feeds single signals through [`BounceService::apply`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::entities::{DeliveryJob, JobStatus};
use crate::domain::repositories::JobRepository;
use crate::error::AppError;

/// Kind of negative delivery signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceKind {
    Bounced,
    Rejected,
}

impl BounceKind {
    pub fn status(self) -> JobStatus {
        match self {
            Self::Bounced => JobStatus::Bounced,
            Self::Rejected => JobStatus::Rejected,
        }
    }
}

/// One external signal keyed by the transport message id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BounceSignal {
    pub message_id: String,
    pub kind: BounceKind,
    pub reason: String,
}

/// Where bounce signals come from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BounceSource: Send + Sync {
    /// Returns the signals received since the previous call.
    async fn fetch(&self) -> Result<Vec<BounceSignal>, AppError>;
}

/// Source that never reports anything.
#[derive(Debug, Clone, Default)]
pub struct NoopBounceSource;

#[async_trait]
impl BounceSource for NoopBounceSource {
    async fn fetch(&self) -> Result<Vec<BounceSignal>, AppError> {
        Ok(Vec::new())
    }
}

pub struct BounceService<J: JobRepository> {
    jobs: Arc<J>,
    source: Arc<dyn BounceSource>,
}

impl<J: JobRepository> BounceService<J> {
    pub fn new(jobs: Arc<J>, source: Arc<dyn BounceSource>) -> Self {
        Self { jobs, source }
    }

    /// Bounce tick: pulls pending signals and applies each one.
    ///
    /// Returns the number of jobs updated. Signals that match no eligible job
    /// or fail to apply are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns the source error if signals cannot be fetched.
    pub async fn reconcile(&self) -> Result<usize, AppError> {
        let signals = self.source.fetch().await?;
        let mut applied = 0;

        for signal in &signals {
            match self.apply(signal).await {
                Ok(Some(_)) => applied += 1,
                Ok(None) => tracing::debug!(
                    message_id = %signal.message_id,
                    "Bounce signal matched no sent job"
                ),
                Err(e) => tracing::warn!(
                    message_id = %signal.message_id,
                    error = %e,
                    "Failed to apply bounce signal"
                ),
            }
        }

        if !signals.is_empty() {
            tracing::info!(received = signals.len(), applied, "Bounce reconciliation finished");
        }

        Ok(applied)
    }

    /// Moves the job carrying `signal.message_id` to `bounced` or `rejected`.
    ///
    /// Angle brackets around the id (as in a raw `Message-ID` header) are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an empty message id.
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn apply(&self, signal: &BounceSignal) -> Result<Option<DeliveryJob>, AppError> {
        let message_id = normalize_message_id(&signal.message_id);
        if message_id.is_empty() {
            return Err(AppError::bad_request(
                "Message id is required",
                json!({ "message_id": signal.message_id }),
            ));
        }

        let job = self
            .jobs
            .mark_by_message_id(message_id, signal.kind.status(), &signal.reason)
            .await?;

        if let Some(job) = &job {
            tracing::info!(
                job_id = job.id,
                campaign_id = job.campaign_id,
                status = %job.status,
                "Bounce signal applied"
            );
        }

        Ok(job)
    }
}

fn normalize_message_id(raw: &str) -> &str {
    raw.trim().trim_start_matches('<').trim_end_matches('>').trim()
}
