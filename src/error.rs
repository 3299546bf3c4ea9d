//! Crate-wide error type.
//!
//! Every variant carries a human-readable message plus a JSON `details`
//! payload that ends up in structured log fields.

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{message}")]
    Conflict { message: String, details: Value },
    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Short machine-readable code, used as a log field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Internal { .. } => "internal_error",
        }
    }

    /// Message plus the underlying cause, if any, for storing on a record.
    ///
    /// `Display` keeps only the message; the cause lives in `details`.
    pub fn reason(&self) -> String {
        match self.details().get("cause").and_then(Value::as_str) {
            Some(cause) if !cause.is_empty() => format!("{self}: {cause}"),
            _ => self.to_string(),
        }
    }

    pub fn details(&self) -> &Value {
        match self {
            AppError::Validation { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::Conflict { details, .. }
            | AppError::Internal { details, .. } => details,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        map_sqlx_error(e)
    }
}

pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": db.constraint() }),
            );
        }
        if db.is_foreign_key_violation() {
            return AppError::bad_request(
                "Referenced record does not exist",
                json!({ "constraint": db.constraint() }),
            );
        }
    }

    AppError::internal("Database error", json!({ "cause": e.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_message() {
        let err = AppError::not_found("Campaign not found", json!({ "id": 4 }));
        assert_eq!(err.to_string(), "Campaign not found");
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.details()["id"], 4);
    }

    #[test]
    fn test_row_not_found_maps_to_internal() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Internal { .. }));
        assert!(err.details()["cause"].as_str().is_some());
    }

    #[test]
    fn test_reason_includes_cause() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        let reason = err.reason();
        assert!(reason.starts_with("Database error: "));
        assert!(reason.len() > "Database error: ".len());

        let err = AppError::not_found("Campaign not found", json!({ "id": 4 }));
        assert_eq!(err.reason(), "Campaign not found");
    }

    #[test]
    fn test_pool_timeout_maps_to_internal() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code(), "internal_error");
    }
}
