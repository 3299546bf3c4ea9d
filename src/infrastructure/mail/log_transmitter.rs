//! Dry-run transport.

use async_trait::async_trait;

use super::generate_message_id;
use crate::domain::transmitter::{MailTransmitter, OutboundMessage, TransmitError};

/// Logs each message instead of sending it.
///
/// Used when `SMTP_DRY_RUN` is set. Jobs still go through the full pipeline
/// and end up `sent` with a generated message id.
#[derive(Debug, Clone, Default)]
pub struct LogTransmitter;

impl LogTransmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailTransmitter for LogTransmitter {
    async fn send(&self, message: OutboundMessage) -> Result<String, TransmitError> {
        message.validate()?;

        let message_id = generate_message_id(&message.from_email);

        tracing::info!(
            to = %message.to,
            from = %message.from_email,
            subject = %message.subject,
            message_id = %message_id,
            html_bytes = message.html.len(),
            text_bytes = message.text.len(),
            "Dry run: message not sent"
        );

        Ok(message_id)
    }
}
