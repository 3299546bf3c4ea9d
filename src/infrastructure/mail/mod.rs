//! Mail transports implementing [`crate::domain::transmitter::MailTransmitter`].
//!
//! - [`SmtpTransmitter`] - SMTP delivery via `lettre`
//! - [`LogTransmitter`] - dry run, writes each message to the log

pub mod log_transmitter;
pub mod smtp_transmitter;

pub use log_transmitter::LogTransmitter;
pub use smtp_transmitter::SmtpTransmitter;

use chrono::Utc;

/// Generates a message id of the form `<nanos>.<random>@<sender domain>`.
///
/// Returned without angle brackets; that is the form stored on the job and
/// matched by bounce signals.
pub fn generate_message_id(from_email: &str) -> String {
    let domain = from_email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost");
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    format!("{nanos}.{:016x}@{domain}", rand::random::<u64>())
}
