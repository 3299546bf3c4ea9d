//! Core domain entities representing the dispatch data model.
//!
//! Entities are plain data structures with the small amount of state-machine
//! logic that belongs to the data itself.
//!
//! # Entity Types
//!
//! - [`Campaign`] - A bulk-email send definition and its lifecycle
//! - [`CampaignMessage`] - The subject/body template attached to a campaign
//! - [`DeliveryJob`] - One message to one recipient
//! - [`Recipient`] - A contact resolved from a campaign audience
//!
//! Creation inputs use separate structs (`NewDeliveryJob`), matching the
//! persisted/new split used throughout the crate.

pub mod campaign;
pub mod delivery_job;
pub mod recipient;

pub use campaign::{Campaign, CampaignMessage, CampaignStatus};
pub use delivery_job::{DeliveryJob, JobStatus, JobStatusCounts, NewDeliveryJob};
pub use recipient::Recipient;
