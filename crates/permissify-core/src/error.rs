//! Error types for Permissify Core.

use thiserror::Error;

/// Errors raised while interpreting permission references.
///
/// Authorization outcomes are never errors; these variants are reserved for
/// malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The reference is malformed, or names nothing in the catalog.
    #[error("invalid permission reference: {0}")]
    InvalidPermissionReference(String),

    /// The reference is of a form the call does not accept.
    #[error("invalid permission type: {0}")]
    InvalidPermissionType(String),

    /// A grantee type tag other than `user`, `group` or `role`.
    #[error("unknown grantee type: {0}")]
    InvalidGranteeType(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
