//! Campaign entity and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a campaign.
///
/// ```text
/// draft → scheduled → processing → queued → running → completed
///                          │          │        │
///                          └──────────┴────────┴──→ error | cancelled | paused
/// ```
///
/// `draft` and `scheduled` are owned by campaign management. The dispatch
/// pipeline only drives `scheduled → processing → queued → completed | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Processing,
    Queued,
    Running,
    Completed,
    Paused,
    Cancelled,
    Error,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 9] = [
        Self::Draft,
        Self::Scheduled,
        Self::Processing,
        Self::Queued,
        Self::Running,
        Self::Completed,
        Self::Paused,
        Self::Cancelled,
        Self::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Processing => "processing",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    /// Returns true for statuses no automatic transition leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Returns whether `self → next` is a forward edge of the lifecycle.
    ///
    /// `completed → completed` is allowed so the stats tick can refresh the
    /// summary message of an already completed campaign.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;

        match (self, next) {
            (Draft, Scheduled) => true,
            (Scheduled, Processing) => true,
            (Processing, Queued | Completed) => true,
            (Queued, Running | Completed) => true,
            (Running, Completed) => true,
            (Completed, Completed) => true,
            (Processing | Queued | Running, Error | Cancelled | Paused) => true,
            (Paused, Queued | Running | Cancelled) => true,
            _ => false,
        }
    }

    /// Statuses from which `next` is reachable in one step.
    pub fn predecessors(next: CampaignStatus) -> Vec<CampaignStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown campaign status '{s}'"))
    }
}

/// A bulk-email send definition tracked through its lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub status: CampaignStatus,
    pub status_message: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Returns true if the campaign is due for dispatch at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Scheduled && self.scheduled_at.is_none_or(|at| at <= now)
    }
}

/// Message template attached to a campaign.
///
/// `subject` and `body` are rendered per recipient; `text_body` is the optional
/// plaintext alternative.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignMessage {
    pub campaign_id: i64,
    pub subject: String,
    pub body: String,
    pub text_body: Option<String>,
    pub from_email: String,
    pub from_name: String,
}
