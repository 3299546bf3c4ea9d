//! Application layer services implementing the dispatch pipeline.
//!
//! Services consume repository and transmitter traits and are driven by the
//! [`crate::scheduler`] and [`crate::workers`].
//!
//! # Available Services
//!
//! - [`services::CampaignService`] - Dispatch tick and stats tick
//! - [`services::CampaignJobFactory`] - Batched job creation
//! - [`services::DeliveryService`] - Render, transmit, retry, persist one job
//! - [`services::BounceService`] - Bounce reconciliation extension point

pub mod services;
