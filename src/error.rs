//! Use-case level errors.
//!
//! Three kinds reach callers: the referenced entity does not exist, the
//! input broke a precondition, or the store failed. Batch operations
//! report these per item (see `usecases::batch`) instead of aborting.

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::ports::repository::RepoError;

/// Errors returned by the engine's use cases.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Referenced cycle/market/offer/order does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The request broke a precondition.
    #[error("validation rejected: {0}")]
    ValidationRejected(String),

    /// A domain rule refused the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The repository port failed.
    #[error("repository error: {0}")]
    StorageFailure(#[source] RepoError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// True for errors raised by the store rather than by the request.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::StorageFailure(_))
    }
}

impl From<RepoError> for EngineError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            other => Self::StorageFailure(other),
        }
    }
}

/// Result alias for use cases.
pub type Result<T> = std::result::Result<T, EngineError>;
