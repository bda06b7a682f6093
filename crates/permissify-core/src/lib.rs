//! # Permissify Core
//!
//! Pure data model for the Permissify authorization layer: permissions,
//! principals, groups, roles, grantees and object-scoped grants.
//!
//! This crate contains no I/O, no storage, no caching. It defines the
//! identities the rest of the workspace passes around and the grammar of
//! permission references.
//!
//! ## Key Types
//!
//! - [`Permission`] - A catalog permission, canonically `"app_label.codename"`
//! - [`PermissionRef`] - Any accepted way of naming one or more permissions
//! - [`Principal`] - The acting user whose authorization is checked
//! - [`GranteeRef`] - A user, group or role that can hold permissions
//! - [`ObjectRef`] - A target object instance for object-scoped grants
//! - [`ObjectGrant`] - A permission bound to one object for one grantee
//! - [`PrincipalQuery`] - Description of a "who holds permission P" query
//!
//! ## Reference grammar
//!
//! See the [`reference`] module for how strings such as `"auth.change_group"`,
//! `"view"`, `"auth.*"` and `"auth.*_group"` are interpreted.

pub mod error;
pub mod grant;
pub mod grantee;
pub mod object;
pub mod permission;
pub mod principal;
pub mod query;
pub mod reference;
pub mod types;

pub use error::{CoreError, Result};
pub use grant::{NewObjectGrant, ObjectGrant, ObjectGrantKey};
pub use grantee::{GranteeKind, GranteeRef};
pub use object::{AsObject, ContentType, ContentTypeKey, ObjectRef};
pub use permission::{action_codename, default_name, NaturalKey, Permission, DEFAULT_ACTIONS};
pub use principal::{Group, NewUser, Principal, Role, AUTH_APP, PERMISSIFY_APP};
pub use query::{PermissionMatch, PrincipalQuery};
pub use reference::{bare_action_key, parse_permission_name, PermissionRef, Specifier};
pub use types::{ContentTypeId, GrantId, GroupId, ObjectId, PermissionId, RoleId, UserId};
