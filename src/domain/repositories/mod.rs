//! Repository trait definitions for the domain layer.
//!
//! This module defines the repository interfaces (traits) that abstract data access
//! operations following the Repository pattern. These traits are implemented by
//! concrete repositories in the infrastructure layer.
//!
//! # Architecture
//!
//! - Traits define the contract for data operations
//! - Implementations live in `crate::infrastructure::persistence`
//! - Mock implementations are auto-generated via `mockall` for testing
//!
//! # Available Repositories
//!
//! - [`CampaignRepository`] - Campaign reads and guarded status transitions
//! - [`JobRepository`] - Delivery-job queue: claim, save, batch insert, counts
//! - [`RecipientRepository`] - Audience resolution
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod campaign_repository;
pub mod job_repository;
pub mod recipient_repository;

pub use campaign_repository::CampaignRepository;
pub use job_repository::JobRepository;
pub use recipient_repository::RecipientRepository;

#[cfg(test)]
pub use campaign_repository::MockCampaignRepository;
#[cfg(test)]
pub use job_repository::MockJobRepository;
#[cfg(test)]
pub use recipient_repository::MockRecipientRepository;
