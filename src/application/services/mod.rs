//! Business logic services for the application layer.

pub mod bounce_service;
pub mod campaign_service;
pub mod delivery_service;
pub mod job_factory;

pub use bounce_service::{BounceKind, BounceService, BounceSignal, BounceSource, NoopBounceSource};
pub use campaign_service::{CampaignService, DispatchOutcome, DispatchSummary};
pub use delivery_service::{DeliveryOptions, DeliveryService, JobOutcome, RetryPolicy};
pub use job_factory::CampaignJobFactory;

#[cfg(test)]
pub use bounce_service::MockBounceSource;
