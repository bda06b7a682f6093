//! # Permissify Permissions
//!
//! Permission resolution on top of a [`Store`](permissify_store::Store).
//!
//! ## Overview
//!
//! A principal holds a permission through one of three sources: a direct
//! grant, a group it belongs to, or a role it holds. Each source can grant
//! globally (a permission edge) or on one object (an object grant).
//!
//! ## Key Types
//!
//! - [`Catalog`] - Resolves references and expands wildcards
//! - [`GrantService`] - Idempotent grant and revoke
//! - [`Authorizer`] - Effective permission sets and `has_permission`
//! - [`ResolutionContext`] - Request-scoped memoization
//! - [`PrincipalSet`] - Lazy "who holds P" query
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use permissify_core::{ContentTypeKey, GranteeRef, NewUser};
//! use permissify_perms::{Authorizer, EngineConfig, GrantService, ResolutionContext};
//! use permissify_store::{MemoryStore, Store, StoreExt};
//!
//! async fn example() {
//!     let store = Arc::new(MemoryStore::new());
//!     store.register_model(&ContentTypeKey::new("auth", "group"), &[]).await.unwrap();
//!     let alice = store.create_user(&NewUser::new("alice")).await.unwrap();
//!
//!     GrantService::new(store.as_ref())
//!         .grant(GranteeRef::from(&alice), &"auth.change_group".into(), None)
//!         .await
//!         .unwrap();
//!
//!     let engine = Authorizer::new(store, EngineConfig::default());
//!     let mut ctx = ResolutionContext::new();
//!     let allowed = engine
//!         .has_permission(&mut ctx, &alice, &"auth.change_group".into(), None)
//!         .await
//!         .unwrap();
//!     assert!(allowed);
//! }
//! ```

pub mod catalog;
pub mod context;
pub mod engine;
pub mod error;
pub mod grant;

pub use catalog::{permission_name, Catalog};
pub use context::{CacheKey, ResolutionContext, Scope};
pub use engine::{Authorizer, EngineConfig, PrincipalSet};
pub use error::{PermsError, Result};
pub use grant::{GrantReport, GrantService};
