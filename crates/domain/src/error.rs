//! Error types for sponsorship operations.

use thiserror::Error;

use crate::models::code::CodeValidity;

/// Failure reported by a [`SponsorshipStore`](crate::services::store::SponsorshipStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A concurrent writer won; the whole operation may be retried.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // serialization_failure, deadlock_detected, unique_violation
            if let Some(code) = db_err.code() {
                if matches!(&*code, "40001" | "40P01" | "23505") {
                    return StoreError::Conflict(db_err.message().to_string());
                }
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Failure reported by an [`IdentityProvider`](crate::services::identity::IdentityProvider).
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Identity backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return IdentityError::EmailTaken;
            }
        }
        IdentityError::Backend(err.to_string())
    }
}

/// Typed outcome of every sponsorship operation.
#[derive(Debug, Error)]
pub enum SponsorshipError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invitation not found or already resolved")]
    AlreadyResolved,

    #[error("Invitation has expired")]
    Expired,

    #[error("Invitation not found or already resolved")]
    NotAuthorized,

    #[error("Insufficient codes: requested {requested}, available {available}")]
    InsufficientInventory { requested: usize, available: usize },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    CodeUnavailable(CodeValidity),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SponsorshipError {
    pub fn insufficient(requested: usize, available: usize) -> Self {
        SponsorshipError::InsufficientInventory {
            requested,
            available,
        }
    }

    /// Whether the failure came from infrastructure rather than the request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SponsorshipError::Identity(IdentityError::Backend(_)) | SponsorshipError::Storage(_)
        )
    }
}

pub type SponsorshipResult<T> = Result<T, SponsorshipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_authorized_message_matches_already_resolved() {
        assert_eq!(
            SponsorshipError::NotAuthorized.to_string(),
            SponsorshipError::AlreadyResolved.to_string()
        );
    }

    #[test]
    fn test_insufficient_message() {
        assert_eq!(
            SponsorshipError::insufficient(5, 3).to_string(),
            "Insufficient codes: requested 5, available 3"
        );
    }

    #[test]
    fn test_row_not_found_is_backend() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_internal_classification() {
        assert!(SponsorshipError::Storage(StoreError::Backend("down".into())).is_internal());
        assert!(!SponsorshipError::Identity(IdentityError::EmailTaken).is_internal());
        assert!(!SponsorshipError::Expired.is_internal());
    }
}
