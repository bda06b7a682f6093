//! Error types for the permissions module.

use permissify_core::CoreError;
use permissify_store::StoreError;
use thiserror::Error;

/// Errors that can occur during permission operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Malformed reference, or no catalog permission matches it.
    #[error("invalid permission reference: {0}")]
    InvalidPermissionReference(String),

    /// The reference form is not accepted by this operation.
    #[error("invalid permission type: {0}")]
    InvalidPermissionType(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<CoreError> for PermsError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidPermissionReference(msg) => PermsError::InvalidPermissionReference(msg),
            CoreError::InvalidPermissionType(msg) | CoreError::InvalidGranteeType(msg) => {
                PermsError::InvalidPermissionType(msg)
            }
        }
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
