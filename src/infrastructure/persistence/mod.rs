//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx runtime
//! queries mapped through `FromRow` row structs.
//!
//! # Repositories
//!
//! - [`PgCampaignRepository`] - Campaign reads and guarded status transitions
//! - [`PgJobRepository`] - Delivery-job queue with `SKIP LOCKED` claims
//! - [`PgRecipientRepository`] - Audience resolution from contacts

pub mod pg_campaign_repository;
pub mod pg_job_repository;
pub mod pg_recipient_repository;

pub use pg_campaign_repository::PgCampaignRepository;
pub use pg_job_repository::PgJobRepository;
pub use pg_recipient_repository::PgRecipientRepository;
