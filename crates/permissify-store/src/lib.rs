//! # Permissify Store
//!
//! Storage abstraction for Permissify. Provides a trait-based interface
//! over the catalog, directory and grant tables with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The [`Store`] trait keeps the authorization engine storage-agnostic.
//! The primary implementation is [`SqliteStore`], with [`MemoryStore`] for
//! testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of an idempotent insert
//! - [`PermissionFilter`] - Catalog selection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use permissify_core::ContentTypeKey;
//! use permissify_store::{SqliteStore, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("permissify.db").unwrap();
//!
//!     // Register auth.group with its default permissions.
//!     let perms = store
//!         .register_model(&ContentTypeKey::new("auth", "group"), &[])
//!         .await
//!         .unwrap();
//!     assert_eq!(perms.len(), 4);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent writes**: inserting an existing edge, role, permission or
//!   object grant returns `AlreadyExists`
//! - **Unique object grants**: at most one row per
//!   `(grantee, object type, object id, permission)`
//! - **Cascading deletes**: removing a user, group or role removes what it
//!   holds and what targets it

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, PermissionFilter, Store, StoreExt};
