//! Application error types

use courier_domain::DomainError;
use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ApplicationError {
    /// Shorthand for a [`ApplicationError::NotFound`] naming the entity.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
