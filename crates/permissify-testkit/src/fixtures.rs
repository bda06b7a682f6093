//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Helpers panic on storage
//! failures so tests read as scenarios.

use permissify::{AuthorizationBackend, Permissify, PermissifyConfig};
use permissify_core::{GranteeRef, Group, NewUser, ObjectRef, PermissionRef, Principal, Role};
use permissify_store::{MemoryStore, SqliteStore, Store, StoreExt};

/// A backend with the default catalog installed.
pub struct TestFixture<S = MemoryStore> {
    pub backend: Permissify<S>,
}

impl TestFixture<MemoryStore> {
    /// In-memory fixture with default configuration.
    pub async fn new() -> Self {
        Self::with_store(MemoryStore::new(), PermissifyConfig::default()).await
    }

    /// In-memory fixture with role support switched off.
    pub async fn without_roles() -> Self {
        Self::with_store(
            MemoryStore::new(),
            PermissifyConfig {
                role_support_enabled: false,
            },
        )
        .await
    }
}

impl TestFixture<SqliteStore> {
    /// Fixture over an in-memory SQLite database.
    pub async fn sqlite() -> Self {
        let store = SqliteStore::open_memory().expect("open in-memory sqlite");
        Self::with_store(store, PermissifyConfig::default()).await
    }
}

impl<S: Store + 'static> TestFixture<S> {
    /// Wrap a store and install the default catalog.
    pub async fn with_store(store: S, config: PermissifyConfig) -> Self {
        let backend = Permissify::new(store, config);
        backend
            .install_default_catalog()
            .await
            .expect("install default catalog");
        Self { backend }
    }

    pub fn store(&self) -> &S {
        self.backend.store()
    }

    /// Create an active user.
    pub async fn user(&self, username: &str) -> Principal {
        self.create(NewUser::new(username)).await
    }

    pub async fn superuser(&self, username: &str) -> Principal {
        self.create(NewUser::new(username).superuser()).await
    }

    pub async fn inactive_user(&self, username: &str) -> Principal {
        self.create(NewUser::new(username).inactive()).await
    }

    async fn create(&self, user: NewUser) -> Principal {
        self.store().create_user(&user).await.expect("create user")
    }

    pub async fn group(&self, name: &str) -> Group {
        self.store().create_group(name).await.expect("create group")
    }

    pub async fn role(&self, name: &str) -> Role {
        let (role, _) = self
            .store()
            .get_or_create_role(name)
            .await
            .expect("create role");
        role
    }

    /// Put `user` in `group`.
    pub async fn join(&self, user: &Principal, group: &Group) {
        self.store()
            .add_user_to_group(user, group)
            .await
            .expect("add user to group");
    }

    /// Give `user` the role `role`.
    pub async fn assign(&self, user: &Principal, role: &Role) {
        self.store()
            .add_user_to_role(user, role)
            .await
            .expect("add user to role");
    }

    pub async fn grant(
        &self,
        grantee: impl Into<GranteeRef>,
        permission: impl Into<PermissionRef>,
        object: Option<&ObjectRef>,
    ) {
        self.backend
            .grant(grantee.into(), permission.into(), object)
            .await
            .expect("grant");
    }

    pub async fn revoke(
        &self,
        grantee: impl Into<GranteeRef>,
        permission: impl Into<PermissionRef>,
        object: Option<&ObjectRef>,
    ) {
        self.backend
            .revoke(grantee.into(), permission.into(), object)
            .await
            .expect("revoke");
    }

    /// `has_permission` in a fresh resolution context.
    pub async fn has(
        &self,
        principal: &Principal,
        permission: impl Into<PermissionRef>,
        object: Option<&ObjectRef>,
    ) -> bool {
        self.backend
            .has_permission(principal, permission.into(), object)
            .await
            .expect("has_permission")
    }

    /// Usernames of the principals holding `permission`.
    pub async fn holders(
        &self,
        permission: impl Into<PermissionRef>,
        include_superusers: bool,
        active_only: Option<bool>,
        object: Option<&ObjectRef>,
    ) -> Vec<String> {
        self.backend
            .filter_principals_with_permission(
                permission.into(),
                include_superusers,
                active_only,
                object,
            )
            .expect("valid permission reference")
            .fetch()
            .await
            .expect("fetch principals")
            .into_iter()
            .map(|principal| principal.username)
            .collect()
    }
}
