//! Domain error types
//!
//! Validation failures and path errors raised by domain operations.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Path is not located under the configured root
    #[error("Path not within sync root: {0}")]
    PathNotInRoot(String),

    /// Unknown sync direction identifier
    #[error("Invalid sync direction: {0}")]
    InvalidDirection(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
