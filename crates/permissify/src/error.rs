//! Error types for Permissify.

use permissify_perms::PermsError;
use permissify_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Permissify operations.
#[derive(Debug, Error)]
pub enum PermissifyError {
    /// Permission resolution or grant error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A role permission entry is not `codename,app_label,model`.
    #[error("invalid role permission {0:?}: expected codename,app_label,model")]
    InvalidRolePermission(String),

    /// A role permission entry names no catalog permission.
    #[error("unknown role permission: {0}")]
    UnknownRolePermission(String),
}

/// Result type for Permissify operations.
pub type Result<T> = std::result::Result<T, PermissifyError>;
