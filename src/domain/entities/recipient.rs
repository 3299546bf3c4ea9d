//! Recipient entity resolved from a campaign audience.

use serde::Serialize;

/// A contact that receives a campaign message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Recipient {
    pub fn new(
        id: i64,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Display name, falling back to the address when no name is known.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();

        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}
