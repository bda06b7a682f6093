//! # Permissify
//!
//! Role-based and object-level permissions on top of a user, group and
//! permission model.
//!
//! ## Overview
//!
//! A principal holds a permission when it is granted:
//!
//! - **directly** to the user,
//! - to a **group** the user belongs to, or
//! - to a **role** the user holds,
//!
//! either **globally** or on **one object** (an object grant). Superusers
//! hold everything; inactive and anonymous principals hold nothing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use permissify::core::{GranteeRef, NewUser, ObjectRef};
//! use permissify::store::{SqliteStore, Store, StoreExt};
//! use permissify::{AuthorizationBackend, Permissify, PermissifyConfig};
//!
//! async fn example() {
//!     let store = SqliteStore::open("permissify.db").unwrap();
//!     let permissify = Permissify::new(store, PermissifyConfig::default());
//!     permissify.install_default_catalog().await.unwrap();
//!
//!     let alice = permissify.store().create_user(&NewUser::new("alice")).await.unwrap();
//!     let editors = permissify.store().create_group("editors").await.unwrap();
//!     permissify.store().add_user_to_group(&alice, &editors).await.unwrap();
//!
//!     // Let editors change one particular group.
//!     let target = ObjectRef::new("auth", "group", 42);
//!     permissify
//!         .grant(GranteeRef::from(&editors), "change".into(), Some(&target))
//!         .await
//!         .unwrap();
//!
//!     assert!(permissify
//!         .has_permission(&alice, "auth.change_group".into(), Some(&target))
//!         .await
//!         .unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `permissify::core` - Identity and grant model
//! - `permissify::store` - Storage abstraction and SQLite
//! - `permissify::perms` - Catalog resolver, grant service and engine

pub mod backend;
pub mod error;
pub mod provision;
pub mod session;

// Re-export component crates
pub use permissify_core as core;
pub use permissify_perms as perms;
pub use permissify_store as store;

// Re-export main types for convenience
pub use backend::{AuthorizationBackend, Permissify, PermissifyConfig, DEFAULT_MODELS};
pub use error::{PermissifyError, Result};
pub use provision::{parse_role_permission, ProvisionedRole};
pub use session::Session;

// Re-export commonly used types
pub use permissify_core::{
    AsObject, GranteeKind, GranteeRef, Group, NewUser, ObjectRef, Permission, PermissionRef,
    Principal, Role,
};
pub use permissify_perms::{GrantReport, PrincipalSet, ResolutionContext};
