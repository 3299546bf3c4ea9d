//! Domain layer containing the dispatch data model and its seams.
//!
//! Nothing here talks to PostgreSQL or an SMTP server directly; those live in
//! [`crate::infrastructure`] behind the traits defined below.
//!
//! # Architecture
//!
//! - [`entities`] - Campaigns, delivery jobs, recipients and their status machines
//! - [`repositories`] - Data access trait definitions
//! - [`transmitter`] - The mail transmission trait
//! - [`render`] - Per-recipient rendering of subject and body
//! - [`rate_limiter`] - Per-worker delivery throttle
//!
//! # Dispatch Flow
//!
//! 1. The scheduler finds `scheduled` campaigns and fans them into queued jobs
//! 2. Workers claim jobs one at a time via [`repositories::JobRepository::claim_next`]
//! 3. Each job is rendered, throttled, transmitted, and saved as sent, requeued or failed
//! 4. The stats tick marks campaigns whose jobs all settled as `completed`

pub mod entities;
pub mod rate_limiter;
pub mod render;
pub mod repositories;
pub mod transmitter;
