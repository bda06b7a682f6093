//! The authorization engine.
//!
//! Computes effective permission sets from three independent sources
//! (direct user grants, group grants, role grants) at global or object
//! scope, and answers `has_permission` from them.
//!
//! Object scope is additive: an object-scoped set is the global set plus
//! the object grants on that exact object. An unscoped grant applies to
//! every object regardless of its type.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use permissify_core::{
    GranteeKind, ObjectRef, Permission, PermissionMatch, PermissionRef, Principal, PrincipalQuery,
    UserId,
};
use permissify_store::{PermissionFilter, Store};

use crate::catalog::permission_name;
use crate::context::{CacheKey, ResolutionContext};
use crate::error::Result;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether role grants participate in resolution.
    pub role_support_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            role_support_enabled: true,
        }
    }
}

/// Resolves permissions for principals against a store.
pub struct Authorizer<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: Store + 'static> Authorizer<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every permission the principal holds, as canonical names.
    pub async fn get_all_permissions(
        &self,
        ctx: &mut ResolutionContext,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        if !principal.can_hold_permissions() {
            return Ok(HashSet::new());
        }

        let key = CacheKey::new(principal.id, None, object);
        if let Some(cached) = ctx.get(&key) {
            trace!(principal = %principal.id, "permission cache hit");
            return Ok(cached.clone());
        }
        trace!(principal = %principal.id, "permission cache miss");

        let permissions = if principal.is_superuser {
            self.catalog_names().await?
        } else {
            let mut all = HashSet::new();
            for source in GranteeKind::ALL {
                all.extend(self.source_permissions(ctx, principal, source, object).await?);
            }
            all
        };

        ctx.insert(key, permissions.clone());
        Ok(permissions)
    }

    /// Permissions granted to the principal directly.
    pub async fn get_user_permissions(
        &self,
        ctx: &mut ResolutionContext,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        self.source_permissions(ctx, principal, GranteeKind::User, object)
            .await
    }

    /// Permissions inherited from the principal's groups.
    pub async fn get_group_permissions(
        &self,
        ctx: &mut ResolutionContext,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        self.source_permissions(ctx, principal, GranteeKind::Group, object)
            .await
    }

    /// Permissions inherited from the principal's roles.
    pub async fn get_role_permissions(
        &self,
        ctx: &mut ResolutionContext,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        self.source_permissions(ctx, principal, GranteeKind::Role, object)
            .await
    }

    /// Whether the principal holds `permission`, globally or on `object`.
    ///
    /// Superusers hold everything. The reference is only canonicalized, so
    /// a well-formed name missing from the catalog is simply not held.
    pub async fn has_permission(
        &self,
        ctx: &mut ResolutionContext,
        principal: &Principal,
        permission: &PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<bool> {
        if !principal.can_hold_permissions() {
            return Ok(false);
        }
        if principal.is_superuser {
            return Ok(true);
        }

        let name = permission_name(permission, object)?;
        let held = self.get_all_permissions(ctx, principal, object).await?;
        Ok(held.contains(&name))
    }

    /// Principals holding `permission`, evaluated lazily.
    ///
    /// The reference is validated now; the store is queried when the
    /// returned set is fetched.
    pub fn filter_principals_with_permission(
        &self,
        permission: &PermissionRef,
        include_superusers: bool,
        active_only: Option<bool>,
        object: Option<&ObjectRef>,
    ) -> Result<PrincipalSet> {
        let matcher = PermissionMatch::from_ref(permission, object)?;
        let query = PrincipalQuery::new(matcher)
            .on_object(object.cloned())
            .include_superusers(include_superusers)
            .active(active_only)
            .include_roles(self.config.role_support_enabled);

        let store: Arc<dyn Store> = self.store.clone();
        Ok(PrincipalSet { store, query })
    }

    async fn source_permissions(
        &self,
        ctx: &mut ResolutionContext,
        principal: &Principal,
        source: GranteeKind,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        if !principal.can_hold_permissions() {
            return Ok(HashSet::new());
        }
        if source == GranteeKind::Role && !self.config.role_support_enabled {
            return Ok(HashSet::new());
        }

        let key = CacheKey::new(principal.id, Some(source), object);
        if let Some(cached) = ctx.get(&key) {
            trace!(principal = %principal.id, %source, "permission cache hit");
            return Ok(cached.clone());
        }

        let permissions = if principal.is_superuser {
            self.catalog_names().await?
        } else {
            let mut held = names(self.store.granted_permissions(principal.id, source).await?);
            if let Some(object) = object {
                held.extend(names(
                    self.store
                        .object_granted_permissions(principal.id, source, object)
                        .await?,
                ));
            }
            held
        };

        ctx.insert(key, permissions.clone());
        Ok(permissions)
    }

    async fn catalog_names(&self) -> Result<HashSet<String>> {
        Ok(names(self.store.list_permissions(&PermissionFilter::All).await?))
    }
}

fn names(permissions: Vec<Permission>) -> HashSet<String> {
    permissions.iter().map(Permission::full_name).collect()
}

/// A lazily evaluated set of principals.
pub struct PrincipalSet {
    store: Arc<dyn Store>,
    query: PrincipalQuery,
}

impl PrincipalSet {
    pub fn query(&self) -> &PrincipalQuery {
        &self.query
    }

    /// Run the query. Principals are ordered by id.
    pub async fn fetch(&self) -> Result<Vec<Principal>> {
        Ok(self.store.filter_principals(&self.query).await?)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.fetch().await?.len())
    }

    pub async fn contains(&self, user: UserId) -> Result<bool> {
        Ok(self.fetch().await?.iter().any(|principal| principal.id == user))
    }
}

impl fmt::Debug for PrincipalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalSet")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::GrantService;
    use permissify_core::{ContentTypeKey, GranteeRef, NewUser};
    use permissify_store::{MemoryStore, StoreExt};

    async fn authorizer(config: EngineConfig) -> Authorizer<MemoryStore> {
        let store = MemoryStore::new();
        store
            .register_model(&ContentTypeKey::new("auth", "group"), &[])
            .await
            .unwrap();
        Authorizer::new(Arc::new(store), config)
    }

    #[tokio::test]
    async fn test_inactive_principal_has_nothing() {
        let engine = authorizer(EngineConfig::default()).await;
        let store = engine.store();
        let user = store
            .create_user(&NewUser::new("ghost").inactive())
            .await
            .unwrap();
        GrantService::new(store)
            .grant(GranteeRef::from(&user), &"auth.*".into(), None)
            .await
            .unwrap();

        let mut ctx = ResolutionContext::new();
        assert!(engine
            .get_all_permissions(&mut ctx, &user, None)
            .await
            .unwrap()
            .is_empty());
        assert!(!engine
            .has_permission(&mut ctx, &user, &"auth.view_group".into(), None)
            .await
            .unwrap());
        assert!(!engine
            .has_permission(&mut ctx, &Principal::anonymous(), &"auth.view_group".into(), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_superuser_holds_catalog() {
        let engine = authorizer(EngineConfig::default()).await;
        let root = engine
            .store()
            .create_user(&NewUser::new("root").superuser())
            .await
            .unwrap();

        let mut ctx = ResolutionContext::new();
        let object = ObjectRef::new("auth", "group", 1);
        let global = engine.get_all_permissions(&mut ctx, &root, None).await.unwrap();
        let scoped = engine
            .get_all_permissions(&mut ctx, &root, Some(&object))
            .await
            .unwrap();
        assert_eq!(global.len(), 4);
        assert_eq!(global, scoped);

        assert!(engine
            .has_permission(&mut ctx, &root, &"anything.at_all".into(), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_permission_is_not_held() {
        let engine = authorizer(EngineConfig::default()).await;
        let user = engine
            .store()
            .create_user(&NewUser::new("alice"))
            .await
            .unwrap();

        let mut ctx = ResolutionContext::new();
        assert!(!engine
            .has_permission(&mut ctx, &user, &"auth.never_registered".into(), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_results_are_memoized_per_context() {
        let engine = authorizer(EngineConfig::default()).await;
        let store = engine.store();
        let user = store.create_user(&NewUser::new("alice")).await.unwrap();
        let grantee = GranteeRef::from(&user);

        let mut ctx = ResolutionContext::new();
        assert!(engine
            .get_all_permissions(&mut ctx, &user, None)
            .await
            .unwrap()
            .is_empty());

        GrantService::new(store)
            .grant(grantee, &"auth.view_group".into(), None)
            .await
            .unwrap();

        // Stale within the same context.
        assert!(engine
            .get_all_permissions(&mut ctx, &user, None)
            .await
            .unwrap()
            .is_empty());

        ctx.invalidate(user.id);
        let fresh = engine.get_all_permissions(&mut ctx, &user, None).await.unwrap();
        assert!(fresh.contains("auth.view_group"));
    }

    #[tokio::test]
    async fn test_role_support_disabled_empties_role_path() {
        let engine = authorizer(EngineConfig {
            role_support_enabled: false,
        })
        .await;
        let store = engine.store();
        let user = store.create_user(&NewUser::new("alice")).await.unwrap();
        let (role, _) = store.get_or_create_role("editor").await.unwrap();
        let group = store.create_group("staff").await.unwrap();
        store.add_user_to_role(&user, &role).await.unwrap();
        store.add_user_to_group(&user, &group).await.unwrap();

        let service = GrantService::new(store);
        service
            .grant(GranteeRef::from(&role), &"auth.change_group".into(), None)
            .await
            .unwrap();
        service
            .grant(GranteeRef::from(&group), &"auth.view_group".into(), None)
            .await
            .unwrap();

        let mut ctx = ResolutionContext::new();
        assert!(engine
            .get_role_permissions(&mut ctx, &user, None)
            .await
            .unwrap()
            .is_empty());
        let all = engine.get_all_permissions(&mut ctx, &user, None).await.unwrap();
        assert_eq!(all, HashSet::from(["auth.view_group".to_string()]));

        let holders = engine
            .filter_principals_with_permission(&"auth.change_group".into(), false, Some(true), None)
            .unwrap();
        assert_eq!(holders.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_filter_principals_rejects_bad_references() {
        let engine = authorizer(EngineConfig::default()).await;

        let malformed =
            engine.filter_principals_with_permission(&"view".into(), true, Some(true), None);
        assert!(matches!(
            malformed,
            Err(crate::PermsError::InvalidPermissionReference(_))
        ));

        let natural = engine.filter_principals_with_permission(
            &("view_group", "auth", "group").into(),
            true,
            Some(true),
            None,
        );
        assert!(matches!(
            natural,
            Err(crate::PermsError::InvalidPermissionType(_))
        ));
    }
}
