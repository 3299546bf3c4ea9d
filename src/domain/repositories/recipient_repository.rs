//! Repository trait for campaign audiences.

use crate::domain::entities::Recipient;
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface resolving who a campaign is sent to.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgRecipientRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Resolves the recipient set of a campaign, ordered by contact id.
    ///
    /// Soft-deleted and unsubscribed contacts are excluded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn resolve_for_campaign(&self, campaign_id: i64) -> Result<Vec<Recipient>, AppError>;

    /// Finds a single recipient by contact id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<Recipient>, AppError>;
}
