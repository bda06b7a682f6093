//! Grant and revoke.
//!
//! Both operations are idempotent: granting an existing tuple or revoking a
//! missing one changes nothing and succeeds. Bulk references apply the
//! operation once per expanded permission.

use permissify_core::{GranteeRef, NewObjectGrant, ObjectGrantKey, ObjectRef, Permission, PermissionRef};
use permissify_store::Store;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::Result;

/// Outcome of a grant or revoke.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantReport {
    /// Permissions whose edge or object grant was created or removed.
    pub changed: Vec<Permission>,
    /// Permissions that were already in the requested state.
    pub unchanged: Vec<Permission>,
}

impl GrantReport {
    fn record(&mut self, permission: Permission, changed: bool) {
        if changed {
            self.changed.push(permission);
        } else {
            self.unchanged.push(permission);
        }
    }

    /// Total number of permissions touched.
    pub fn len(&self) -> usize {
        self.changed.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutates grant edges and object grants.
pub struct GrantService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> GrantService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Grant `permission` to `grantee`, globally or on `object`.
    pub async fn grant(
        &self,
        grantee: GranteeRef,
        permission: &PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport> {
        let permissions = Catalog::new(self.store).expand(permission, object).await?;
        let mut report = GrantReport::default();

        for permission in permissions {
            let inserted = match object {
                None => self
                    .store
                    .add_permission_edge(grantee, permission.id)
                    .await?
                    .is_inserted(),
                Some(object) => {
                    let new = NewObjectGrant::for_object(grantee, permission.clone(), object);
                    let (_, result) = self.store.get_or_create_object_grant(&new).await?;
                    result.is_inserted()
                }
            };
            report.record(permission, inserted);
        }

        debug!(
            %grantee,
            object = object.map(tracing::field::display),
            changed = report.changed.len(),
            unchanged = report.unchanged.len(),
            "granted permissions"
        );
        Ok(report)
    }

    /// Revoke `permission` from `grantee`, globally or on `object`.
    pub async fn revoke(
        &self,
        grantee: GranteeRef,
        permission: &PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport> {
        let permissions = Catalog::new(self.store).expand(permission, object).await?;
        let mut report = GrantReport::default();

        for permission in permissions {
            let removed = match object {
                None => {
                    self.store
                        .remove_permission_edge(grantee, permission.id)
                        .await?
                }
                Some(object) => {
                    let key = ObjectGrantKey {
                        grantee,
                        object: object.clone(),
                        permission: permission.id,
                    };
                    self.store.delete_object_grant(&key).await?
                }
            };
            report.record(permission, removed);
        }

        debug!(
            %grantee,
            object = object.map(tracing::field::display),
            changed = report.changed.len(),
            unchanged = report.unchanged.len(),
            "revoked permissions"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permissify_core::{ContentTypeKey, GranteeKind, NewUser};
    use permissify_store::{MemoryStore, StoreExt};

    async fn setup() -> (MemoryStore, GranteeRef) {
        let store = MemoryStore::new();
        store
            .register_model(&ContentTypeKey::new("auth", "group"), &[])
            .await
            .unwrap();
        let user = store.create_user(&NewUser::new("alice")).await.unwrap();
        (store, GranteeRef::from(&user))
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let (store, alice) = setup().await;
        let service = GrantService::new(&store);
        let perm: PermissionRef = "auth.change_group".into();

        let first = service.grant(alice, &perm, None).await.unwrap();
        let second = service.grant(alice, &perm, None).await.unwrap();
        assert_eq!(first.changed.len(), 1);
        assert!(second.changed.is_empty());
        assert_eq!(second.unchanged.len(), 1);

        let edges = store.permission_edges(alice).await.unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_missing_is_noop() {
        let (store, alice) = setup().await;
        let service = GrantService::new(&store);

        let report = service
            .revoke(alice, &"auth.view_group".into(), None)
            .await
            .unwrap();
        assert!(report.changed.is_empty());
        assert_eq!(report.unchanged.len(), 1);
    }

    #[tokio::test]
    async fn test_object_grant_round_trip() {
        let (store, alice) = setup().await;
        let service = GrantService::new(&store);
        let group = ObjectRef::new("auth", "group", 5);

        service.grant(alice, &"change".into(), Some(&group)).await.unwrap();
        let held = store
            .object_granted_permissions(alice.id.into(), GranteeKind::User, &group)
            .await
            .unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].full_name(), "auth.change_group");

        let report = service
            .revoke(alice, &"change".into(), Some(&group))
            .await
            .unwrap();
        assert_eq!(report.changed.len(), 1);
        assert!(store.object_grants_for(&group).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wildcard_grant_applies_each_permission() {
        let (store, alice) = setup().await;
        let service = GrantService::new(&store);

        let report = service.grant(alice, &"auth.*".into(), None).await.unwrap();
        assert_eq!(report.changed.len(), 4);
        assert_eq!(store.permission_edges(alice).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_reference_changes_nothing() {
        let (store, alice) = setup().await;
        let service = GrantService::new(&store);

        let result = service
            .grant(alice, &"auth.view_group, auth.nope_group".into(), None)
            .await;
        assert!(result.is_err());
        assert!(store.permission_edges(alice).await.unwrap().is_empty());
    }
}
