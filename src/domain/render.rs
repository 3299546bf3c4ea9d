//! Per-recipient rendering of campaign subject and body.
//!
//! Templates use `{{ name }}` placeholders. The set of names is fixed by
//! [`RenderContext::variables`]; anything else is a [`RenderError`].

use crate::domain::entities::{Campaign, CampaignMessage, Recipient};
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Plaintext body used when a message has no text alternative.
pub const DEFAULT_TEXT_BODY: &str = "Please view this email with an HTML-capable email client.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("{field} template references unknown variable '{name}'")]
    UnknownVariable { field: &'static str, name: String },
    #[error("{field} template has an unterminated or malformed tag near '{fragment}'")]
    Malformed {
        field: &'static str,
        fragment: String,
    },
}

/// Everything a template may reference for one delivery.
///
/// Assembled right before rendering and dropped after transmission.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub recipient: &'a Recipient,
    pub campaign: &'a Campaign,
    pub message: &'a CampaignMessage,
    pub now: DateTime<Utc>,
    pub unsubscribe_url: String,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        recipient: &'a Recipient,
        campaign: &'a Campaign,
        message: &'a CampaignMessage,
        now: DateTime<Utc>,
        unsubscribe_base: &Url,
    ) -> Self {
        Self {
            recipient,
            campaign,
            message,
            now,
            unsubscribe_url: unsubscribe_url(unsubscribe_base, recipient),
        }
    }

    /// Flattened variable table, keyed by placeholder name.
    pub fn variables(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("recipient.id", self.recipient.id.to_string()),
            ("recipient.email", self.recipient.email.clone()),
            ("recipient.name", self.recipient.display_name()),
            ("recipient.first_name", self.recipient.first_name.clone()),
            ("recipient.last_name", self.recipient.last_name.clone()),
            ("campaign.id", self.campaign.id.to_string()),
            ("campaign.name", self.campaign.name.clone()),
            ("message.subject", self.message.subject.clone()),
            ("message.from_name", self.message.from_name.clone()),
            ("message.from_email", self.message.from_email.clone()),
            ("date", self.now.format("%Y-%m-%d").to_string()),
            ("now", self.now.to_rfc3339()),
            ("unsubscribe_url", self.unsubscribe_url.clone()),
        ])
    }
}

/// Builds `<base>?email=<email>&uuid=<recipient id>`.
pub fn unsubscribe_url(base: &Url, recipient: &Recipient) -> String {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("email", &recipient.email)
        .append_pair("uuid", &recipient.id.to_string());
    url.into()
}

/// Rendered content of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Renders subject, HTML body and plaintext fallback for one recipient.
///
/// Values substituted into the HTML body are escaped; subject and plaintext
/// are emitted verbatim.
pub fn render_message(context: &RenderContext<'_>) -> Result<RenderedMessage, RenderError> {
    let variables = context.variables();

    let subject = render("subject", &context.message.subject, &variables, false)?;
    let html = render("body", &context.message.body, &variables, true)?;
    let text = match context.message.text_body.as_deref() {
        Some(text) if !text.trim().is_empty() => render("text", text, &variables, false)?,
        _ => DEFAULT_TEXT_BODY.to_string(),
    };

    Ok(RenderedMessage {
        subject,
        html,
        text,
    })
}

fn render(
    field: &'static str,
    template: &str,
    variables: &BTreeMap<&'static str, String>,
    escape: bool,
) -> Result<String, RenderError> {
    // Any `{{` left once well-formed tags are removed does not match the grammar.
    // Checked on the template so substituted values may contain braces.
    let stripped = PLACEHOLDER.replace_all(template, "");
    if let Some(pos) = stripped.find("{{") {
        let fragment: String = stripped[pos..].chars().take(24).collect();
        return Err(RenderError::Malformed { field, fragment });
    }

    let mut unknown = None;

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match variables.get(name) {
            Some(value) if escape => escape_html(value),
            Some(value) => value.clone(),
            None => {
                unknown.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    if let Some(name) = unknown {
        return Err(RenderError::UnknownVariable { field, name });
    }

    Ok(rendered.into_owned())
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
