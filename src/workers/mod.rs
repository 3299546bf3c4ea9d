//! Delivery workers.
//!
//! The persistent job table is the queue; workers share nothing in memory and
//! coordinate only through [`crate::domain::repositories::JobRepository::claim_next`].
//!
//! - [`MailWorker`] - one claim loop with its own rate limiter
//! - [`WorkerPool`] - the set of workers, started, stopped and restarted together

pub mod mail_worker;
pub mod pool;

#[cfg(test)]
pub(crate) mod test_support;

pub use mail_worker::{MailWorker, WorkerStatus};
pub use pool::WorkerPool;
