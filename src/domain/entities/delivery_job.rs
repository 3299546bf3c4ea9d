//! Delivery job entity: one campaign message to one recipient.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Status of a single delivery job.
///
/// Workers move jobs `queued → sending → sent | queued | failed`.
/// `bounced`, `rejected`, `opened` and `clicked` are written by external
/// signals (see [`crate::application::services::BounceService`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Sending,
    Sent,
    Failed,
    Bounced,
    Rejected,
    Opened,
    Clicked,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        Self::Queued,
        Self::Sending,
        Self::Sent,
        Self::Failed,
        Self::Bounced,
        Self::Rejected,
        Self::Opened,
        Self::Clicked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Bounced => "bounced",
            Self::Rejected => "rejected",
            Self::Opened => "opened",
            Self::Clicked => "clicked",
        }
    }

    /// Returns true if no worker will pick the job up again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Sending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status '{s}'"))
    }
}

/// A unit of work: send one campaign's message to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryJob {
    pub id: i64,
    pub campaign_id: i64,
    pub recipient_id: i64,
    pub status: JobStatus,
    pub status_message: String,
    pub attempts: i32,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryJob {
    /// Records a successful transmission.
    pub fn mark_sent(&mut self, message_id: String, now: DateTime<Utc>) {
        self.status = JobStatus::Sent;
        self.status_message.clear();
        self.sent_at = Some(now);
        self.message_id = Some(message_id);
        self.updated_at = now;
    }

    /// Returns the job to the queue with the failure reason attached.
    pub fn requeue(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = JobStatus::Queued;
        self.status_message = reason.into();
        self.updated_at = now;
    }

    /// Marks the job as terminally failed.
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.status_message = reason.into();
        self.updated_at = now;
    }
}

/// Input data for creating a queued job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeliveryJob {
    pub campaign_id: i64,
    pub recipient_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-status job counts for one campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatusCounts(BTreeMap<JobStatus, i64>);

impl JobStatusCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, status: JobStatus, count: i64) -> Self {
        self.set(status, count);
        self
    }

    pub fn set(&mut self, status: JobStatus, count: i64) {
        self.0.insert(status, count);
    }

    pub fn get(&self, status: JobStatus) -> i64 {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobStatus, i64)> + '_ {
        self.0.iter().map(|(status, count)| (*status, *count))
    }

    /// Jobs still owned by the delivery pipeline plus those it finished.
    ///
    /// Post-delivery annotation statuses (`bounced`, `opened`, ...) are left
    /// out so they never hold a campaign open.
    pub fn pipeline_total(&self) -> i64 {
        [
            JobStatus::Queued,
            JobStatus::Sending,
            JobStatus::Sent,
            JobStatus::Failed,
        ]
        .into_iter()
        .map(|status| self.get(status))
        .sum()
    }

    /// Returns true once every pipeline job reached `sent` or `failed`.
    pub fn is_settled(&self) -> bool {
        let total = self.pipeline_total();
        total > 0 && self.get(JobStatus::Sent) + self.get(JobStatus::Failed) == total
    }
}
