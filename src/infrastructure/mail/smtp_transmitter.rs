//! SMTP transport built on `lettre`.

use async_trait::async_trait;
use lettre::message::header::{HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::generate_message_id;
use crate::config::SmtpConfig;
use crate::domain::transmitter::{MailTransmitter, OutboundMessage, TransmitError};

/// Sends messages over one pooled SMTP connection set.
///
/// With `tls` enabled the connection is wrapped in TLS from the first byte
/// (implicit TLS); otherwise plain SMTP is used. Credentials are only sent
/// when a username is configured.
#[derive(Clone)]
pub struct SmtpTransmitter {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransmitter {
    /// Builds the transport. No connection is opened until the first send.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS parameters cannot be created for `host`.
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port);

        if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
        })
    }

    fn build_message(message: &OutboundMessage, message_id: &str) -> Result<Message, TransmitError> {
        let from_address: Address = message
            .from_email
            .parse()
            .map_err(|e| TransmitError::permanent(format!("invalid sender address: {e}")))?;
        let to_address: Address = message
            .to
            .parse()
            .map_err(|e| TransmitError::permanent(format!("invalid recipient address: {e}")))?;

        let from_name = Some(message.from_name.clone()).filter(|name| !name.is_empty());

        let mut builder = Message::builder()
            .from(Mailbox::new(from_name, from_address))
            .to(Mailbox::new(None, to_address))
            .subject(message.subject.as_str())
            .message_id(Some(format!("<{message_id}>")));

        for (name, value) in &message.headers {
            let header_name = HeaderName::new_from_ascii(name.clone())
                .map_err(|_| TransmitError::permanent(format!("invalid header name '{name}'")))?;
            builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| TransmitError::permanent(format!("failed to build message: {e}")))
    }
}

#[async_trait]
impl MailTransmitter for SmtpTransmitter {
    async fn send(&self, message: OutboundMessage) -> Result<String, TransmitError> {
        message.validate()?;

        let message_id = generate_message_id(&message.from_email);
        let email = Self::build_message(&message, &message_id)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| TransmitError::new(format!("smtp send failed: {e}")))?;

        tracing::debug!(to = %message.to, message_id = %message_id, "Message handed to SMTP server");

        Ok(message_id)
    }
}
