//! Domain error types

use thiserror::Error;

/// Domain-level validation errors.
///
/// These are raised while turning a declarative request into something
/// dispatchable. They are scoped to a single send and never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The request URL is empty or could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The auth configuration cannot produce a credential.
    #[error("invalid auth configuration: {0}")]
    InvalidAuth(String),

    /// The body configuration cannot be encoded.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The HTTP method is not supported.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
