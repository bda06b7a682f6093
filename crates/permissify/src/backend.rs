//! The authorization backend.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use permissify_core::{
    ContentTypeKey, GranteeRef, ObjectRef, Permission, PermissionRef, Principal, AUTH_APP,
    PERMISSIFY_APP,
};
use permissify_perms::{
    Authorizer, EngineConfig, GrantReport, GrantService, PrincipalSet, ResolutionContext,
};
use permissify_store::{Store, StoreExt};

use crate::error::Result;
use crate::session::Session;

/// Models registered by [`Permissify::install_default_catalog`].
pub const DEFAULT_MODELS: [(&str, &str); 4] = [
    (AUTH_APP, "user"),
    (AUTH_APP, "group"),
    (AUTH_APP, "permission"),
    (PERMISSIFY_APP, "role"),
];

/// Configuration for Permissify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissifyConfig {
    /// Whether role grants participate in resolution and principal queries.
    pub role_support_enabled: bool,
}

impl Default for PermissifyConfig {
    fn default() -> Self {
        Self {
            role_support_enabled: true,
        }
    }
}

impl PermissifyConfig {
    fn engine(&self) -> EngineConfig {
        EngineConfig {
            role_support_enabled: self.role_support_enabled,
        }
    }
}

/// Authorization as seen by a host application.
///
/// Every call resolves in a fresh [`ResolutionContext`]; use a [`Session`]
/// to memoize across calls within one request.
#[async_trait]
pub trait AuthorizationBackend: Send + Sync {
    /// Whether `principal` holds `permission`, globally or on `object`.
    async fn has_permission(
        &self,
        principal: &Principal,
        permission: PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<bool>;

    /// Canonical names of every permission `principal` holds.
    async fn get_all_permissions(
        &self,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>>;

    /// Lazy set of principals holding `permission`.
    fn filter_principals_with_permission(
        &self,
        permission: PermissionRef,
        include_superusers: bool,
        active_only: Option<bool>,
        object: Option<&ObjectRef>,
    ) -> Result<PrincipalSet>;

    /// Grant `permission` to `grantee`. Idempotent.
    async fn grant(
        &self,
        grantee: GranteeRef,
        permission: PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport>;

    /// Revoke `permission` from `grantee`. Idempotent.
    async fn revoke(
        &self,
        grantee: GranteeRef,
        permission: PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport>;
}

/// The Permissify backend.
///
/// Provides a unified API for:
/// - Registering models and their permissions
/// - Granting and revoking global and object-level permissions
/// - Checking permissions and listing holders
pub struct Permissify<S> {
    store: Arc<S>,
    engine: Authorizer<S>,
    config: PermissifyConfig,
}

impl<S: Store + 'static> Permissify<S> {
    /// Create a backend over `store`.
    pub fn new(store: S, config: PermissifyConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Create a backend over a store shared with other owners.
    pub fn with_shared_store(store: Arc<S>, config: PermissifyConfig) -> Self {
        let engine = Authorizer::new(store.clone(), config.engine());
        Self {
            store,
            engine,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PermissifyConfig {
        &self.config
    }

    pub fn engine(&self) -> &Authorizer<S> {
        &self.engine
    }

    /// Open a request-scoped session with its own memoization.
    pub fn session(&self) -> Session<'_, S> {
        Session::new(self)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// Register the built-in models with their default permissions.
    pub async fn install_default_catalog(&self) -> Result<Vec<Permission>> {
        let mut installed = Vec::new();
        for (app_label, model) in DEFAULT_MODELS {
            installed.extend(
                self.register_model(&ContentTypeKey::new(app_label, model), &[])
                    .await?,
            );
        }
        Ok(installed)
    }

    /// Register a model: its content type, the default actions and any
    /// custom codenames.
    pub async fn register_model(
        &self,
        content_type: &ContentTypeKey,
        custom_actions: &[&str],
    ) -> Result<Vec<Permission>> {
        Ok(self
            .store
            .register_model(content_type, custom_actions)
            .await?)
    }
}

#[async_trait]
impl<S: Store + 'static> AuthorizationBackend for Permissify<S> {
    async fn has_permission(
        &self,
        principal: &Principal,
        permission: PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<bool> {
        let mut ctx = ResolutionContext::new();
        Ok(self
            .engine
            .has_permission(&mut ctx, principal, &permission, object)
            .await?)
    }

    async fn get_all_permissions(
        &self,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        let mut ctx = ResolutionContext::new();
        Ok(self
            .engine
            .get_all_permissions(&mut ctx, principal, object)
            .await?)
    }

    fn filter_principals_with_permission(
        &self,
        permission: PermissionRef,
        include_superusers: bool,
        active_only: Option<bool>,
        object: Option<&ObjectRef>,
    ) -> Result<PrincipalSet> {
        Ok(self.engine.filter_principals_with_permission(
            &permission,
            include_superusers,
            active_only,
            object,
        )?)
    }

    async fn grant(
        &self,
        grantee: GranteeRef,
        permission: PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport> {
        Ok(GrantService::new(self.store.as_ref())
            .grant(grantee, &permission, object)
            .await?)
    }

    async fn revoke(
        &self,
        grantee: GranteeRef,
        permission: PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport> {
        Ok(GrantService::new(self.store.as_ref())
            .revoke(grantee, &permission, object)
            .await?)
    }
}
