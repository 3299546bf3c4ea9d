//! Mail transmission seam consumed by the delivery pipeline.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// A fully rendered message ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from_email: String,
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub headers: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Checks the invariants every transport relies on.
    pub fn validate(&self) -> Result<(), TransmitError> {
        if self.to.trim().is_empty() {
            return Err(TransmitError::permanent("recipient email is required"));
        }
        if self.html.is_empty() && self.text.is_empty() {
            return Err(TransmitError::permanent(
                "either HTML or text content is required",
            ));
        }
        Ok(())
    }
}

/// Transport failure; the message is stored verbatim on the job.
///
/// A permanent error (bad address, unbuildable message) cannot succeed on
/// retry and fails the job at once. Everything else follows the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransmitError {
    message: String,
    permanent: bool,
}

impl TransmitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: true,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }
}

/// Hands a rendered message to a mail transport.
///
/// # Implementations
///
/// - [`crate::infrastructure::mail::SmtpTransmitter`] - SMTP via `lettre`
/// - [`crate::infrastructure::mail::LogTransmitter`] - dry run, logs only
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransmitter: Send + Sync {
    /// Transmits the message and returns the transport message id.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError`] with the transport's failure description.
    async fn send(&self, message: OutboundMessage) -> Result<String, TransmitError>;
}
