//! Store trait: the abstract interface over the grant relationship tables.
//!
//! The engine is storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests).

use async_trait::async_trait;
use permissify_core::{
    default_name, ContentType, ContentTypeKey, GranteeKind, GranteeRef, Group, GroupId, NaturalKey,
    NewObjectGrant, NewUser, ObjectGrant, ObjectGrantKey, ObjectRef, Permission, PermissionId,
    Principal, PrincipalQuery, Role, RoleId, UserId, DEFAULT_ACTIONS,
};

use crate::error::Result;

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Row was inserted.
    Inserted,
    /// Row already exists (idempotent - not an error).
    AlreadyExists,
}

impl InsertResult {
    pub fn is_inserted(self) -> bool {
        matches!(self, InsertResult::Inserted)
    }
}

/// Selection of catalog permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionFilter {
    /// The whole catalog.
    All,
    /// Every permission under an app label.
    App(String),
    /// Every permission of one content type.
    ContentType(ContentTypeKey),
}

/// The Store trait: async interface for permission persistence.
///
/// # Design Notes
///
/// - **Idempotent writes**: get-or-create inserts report `AlreadyExists`
///   instead of failing, and deletes report whether a row was removed.
/// - **Atomic rows**: each single-row insert or delete is atomic. Deleting
///   a grantee cascades to its edges, memberships and object grants in one
///   step.
/// - **Addressable sources**: direct, group and role grants are queried
///   separately so the engine can compose or skip them independently.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// Get or register a content type.
    async fn get_or_create_content_type(&self, key: &ContentTypeKey) -> Result<ContentType>;

    /// Look up a content type by natural key.
    async fn get_content_type(&self, key: &ContentTypeKey) -> Result<Option<ContentType>>;

    /// Get or register a permission for a content type.
    async fn get_or_create_permission(
        &self,
        content_type: &ContentTypeKey,
        codename: &str,
        name: &str,
    ) -> Result<(Permission, InsertResult)>;

    /// Look up a permission by `(app_label, codename)`.
    async fn get_permission(&self, app_label: &str, codename: &str) -> Result<Option<Permission>>;

    /// Look up a permission by `(codename, app_label, model)`.
    async fn get_permission_by_natural_key(&self, key: &NaturalKey) -> Result<Option<Permission>>;

    /// List catalog permissions, ordered by id.
    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<Vec<Permission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Directory
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a user. Usernames are unique.
    async fn create_user(&self, user: &NewUser) -> Result<Principal>;

    /// Load a user.
    async fn get_user(&self, id: UserId) -> Result<Option<Principal>>;

    /// Delete a user and cascade to its edges, memberships and grants.
    async fn delete_user(&self, id: UserId) -> Result<bool>;

    /// Create a group. Names are unique.
    async fn create_group(&self, name: &str) -> Result<Group>;

    /// Delete a group and cascade to its edges, memberships and grants.
    async fn delete_group(&self, id: GroupId) -> Result<bool>;

    /// Get or create a role by name.
    async fn get_or_create_role(&self, name: &str) -> Result<(Role, InsertResult)>;

    /// Look up a role by name.
    async fn get_role(&self, name: &str) -> Result<Option<Role>>;

    /// Delete a role and cascade to its edges, memberships and grants.
    async fn delete_role(&self, id: RoleId) -> Result<bool>;

    /// Add a user to a group or role.
    async fn add_membership(&self, user: UserId, target: GranteeRef) -> Result<InsertResult>;

    /// Remove a user from a group or role.
    async fn remove_membership(&self, user: UserId, target: GranteeRef) -> Result<bool>;

    /// Groups or roles a user belongs to.
    async fn memberships(&self, user: UserId, kind: GranteeKind) -> Result<Vec<GranteeRef>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Unscoped grant edges
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach a permission to a grantee's permission collection.
    async fn add_permission_edge(
        &self,
        grantee: GranteeRef,
        permission: PermissionId,
    ) -> Result<InsertResult>;

    /// Detach a permission from a grantee's permission collection.
    async fn remove_permission_edge(
        &self,
        grantee: GranteeRef,
        permission: PermissionId,
    ) -> Result<bool>;

    /// Replace a grantee's permission collection with `permissions` in one
    /// atomic step. Returns the number of edges removed. On error the
    /// previous collection is left in place.
    async fn replace_permission_edges(
        &self,
        grantee: GranteeRef,
        permissions: &[PermissionId],
    ) -> Result<usize>;

    /// Permissions directly attached to a grantee, ordered by id.
    async fn permission_edges(&self, grantee: GranteeRef) -> Result<Vec<Permission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Object grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Get or create the unique object grant for this tuple.
    async fn get_or_create_object_grant(
        &self,
        grant: &NewObjectGrant,
    ) -> Result<(ObjectGrant, InsertResult)>;

    /// Delete the object grant for this tuple, if any.
    async fn delete_object_grant(&self, key: &ObjectGrantKey) -> Result<bool>;

    /// Every grant targeting an object.
    async fn object_grants_for(&self, object: &ObjectRef) -> Result<Vec<ObjectGrant>>;

    /// Drop every grant targeting an object (the object was deleted).
    async fn delete_object_grants_for(&self, object: &ObjectRef) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Unscoped permissions a user holds through one source: its own edges,
    /// its groups' edges, or its roles' edges.
    async fn granted_permissions(&self, user: UserId, source: GranteeKind)
        -> Result<Vec<Permission>>;

    /// Permissions of object grants on `object` held through one source.
    async fn object_granted_permissions(
        &self,
        user: UserId,
        source: GranteeKind,
        object: &ObjectRef,
    ) -> Result<Vec<Permission>>;

    /// Evaluate a principal query, ordered by user id.
    async fn filter_principals(&self, query: &PrincipalQuery) -> Result<Vec<Principal>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Register a model: its content type plus the default actions and any
    /// custom ones.
    fn register_model(
        &self,
        content_type: &ContentTypeKey,
        custom_actions: &[&str],
    ) -> impl std::future::Future<Output = Result<Vec<Permission>>> + Send;

    /// Add a user to a group.
    fn add_user_to_group(
        &self,
        user: &Principal,
        group: &Group,
    ) -> impl std::future::Future<Output = Result<InsertResult>> + Send;

    /// Give a user a role.
    fn add_user_to_role(
        &self,
        user: &Principal,
        role: &Role,
    ) -> impl std::future::Future<Output = Result<InsertResult>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn register_model(
        &self,
        content_type: &ContentTypeKey,
        custom_actions: &[&str],
    ) -> Result<Vec<Permission>> {
        self.get_or_create_content_type(content_type).await?;

        let mut registered = Vec::with_capacity(DEFAULT_ACTIONS.len() + custom_actions.len());
        for action in DEFAULT_ACTIONS {
            let codename = format!("{}_{}", action, content_type.model);
            let (permission, _) = self
                .get_or_create_permission(content_type, &codename, &default_name(&codename))
                .await?;
            registered.push(permission);
        }
        for codename in custom_actions {
            let (permission, _) = self
                .get_or_create_permission(content_type, codename, &default_name(codename))
                .await?;
            registered.push(permission);
        }

        tracing::debug!(
            content_type = %content_type,
            permissions = registered.len(),
            "registered model"
        );
        Ok(registered)
    }

    async fn add_user_to_group(&self, user: &Principal, group: &Group) -> Result<InsertResult> {
        self.add_membership(user.id, GranteeRef::from(group)).await
    }

    async fn add_user_to_role(&self, user: &Principal, role: &Role) -> Result<InsertResult> {
        self.add_membership(user.id, GranteeRef::from(role)).await
    }
}
