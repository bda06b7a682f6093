//! Role provisioning.
//!
//! Roles are provisioned with permission entries in the form
//! `codename,app_label,model`, e.g. `change_group,auth,group`.

use permissify_core::{GranteeRef, NaturalKey, Permission, Role};
use permissify_store::Store;
use serde::Serialize;
use tracing::info;

use crate::backend::Permissify;
use crate::error::{PermissifyError, Result};

/// Outcome of [`Permissify::add_role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedRole {
    pub role: Role,
    /// Whether the role was created by this call.
    pub created: bool,
    /// The role's permission set after the call.
    pub permissions: Vec<Permission>,
}

/// Parse a `codename,app_label,model` entry.
pub fn parse_role_permission(entry: &str) -> Result<NaturalKey> {
    let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [codename, app_label, model]
            if !codename.is_empty() && !app_label.is_empty() && !model.is_empty() =>
        {
            Ok(NaturalKey::new(*codename, *app_label, *model))
        }
        _ => Err(PermissifyError::InvalidRolePermission(entry.to_string())),
    }
}

impl<S: Store + 'static> Permissify<S> {
    /// Create `name` if needed and replace its permission set.
    ///
    /// Every entry is resolved before the role is touched, so an unknown
    /// permission leaves an existing role unchanged.
    pub async fn add_role<P: AsRef<str>>(&self, name: &str, permissions: &[P]) -> Result<ProvisionedRole> {
        let mut resolved = Vec::with_capacity(permissions.len());
        for entry in permissions {
            let key = parse_role_permission(entry.as_ref())?;
            let permission = self
                .store()
                .get_permission_by_natural_key(&key)
                .await?
                .ok_or_else(|| PermissifyError::UnknownRolePermission(entry.as_ref().to_string()))?;
            resolved.push(permission);
        }

        let (role, inserted) = self.store().get_or_create_role(name).await?;
        let grantee = GranteeRef::from(&role);

        let ids: Vec<_> = resolved.iter().map(|permission| permission.id).collect();
        let cleared = self.store().replace_permission_edges(grantee, &ids).await?;
        let permissions = self.store().permission_edges(grantee).await?;

        info!(
            role = %role.name,
            created = inserted.is_inserted(),
            cleared,
            permissions = permissions.len(),
            "provisioned role"
        );
        Ok(ProvisionedRole {
            role,
            created: inserted.is_inserted(),
            permissions,
        })
    }

    /// Delete the role called `name` and everything attached to it.
    ///
    /// Returns `false` when no such role exists.
    pub async fn remove_role(&self, name: &str) -> Result<bool> {
        let Some(role) = self.store().get_role(name).await? else {
            info!(role = %name, "role not found, nothing to remove");
            return Ok(false);
        };

        let removed = self.store().delete_role(role.id).await?;
        info!(role = %name, removed, "removed role");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PermissifyConfig;
    use crate::AuthorizationBackend;
    use permissify_core::NewUser;
    use permissify_store::{MemoryStore, StoreExt};

    async fn backend() -> Permissify<MemoryStore> {
        let permissify = Permissify::new(MemoryStore::new(), PermissifyConfig::default());
        permissify.install_default_catalog().await.unwrap();
        permissify
    }

    #[test]
    fn test_parse_role_permission() {
        let key = parse_role_permission("change_group, auth, group").unwrap();
        assert_eq!(key, NaturalKey::new("change_group", "auth", "group"));

        assert!(matches!(
            parse_role_permission("auth.change_group"),
            Err(PermissifyError::InvalidRolePermission(_))
        ));
        assert!(matches!(
            parse_role_permission("a,b,c,d"),
            Err(PermissifyError::InvalidRolePermission(_))
        ));
        assert!(matches!(
            parse_role_permission("a,,c"),
            Err(PermissifyError::InvalidRolePermission(_))
        ));
    }

    #[tokio::test]
    async fn test_add_role_replaces_permissions() {
        let permissify = backend().await;

        let first = permissify
            .add_role("editor", &["change_group,auth,group", "view_group,auth,group"])
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.permissions.len(), 2);

        let second = permissify
            .add_role("editor", &["view_user,auth,user"])
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.role, first.role);
        let names: Vec<String> = second.permissions.iter().map(Permission::full_name).collect();
        assert_eq!(names, vec!["auth.view_user"]);

        let empty = permissify.add_role::<&str>("editor", &[]).await.unwrap();
        assert!(empty.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_add_role_unknown_permission_leaves_role() {
        let permissify = backend().await;
        permissify
            .add_role("editor", &["view_group,auth,group"])
            .await
            .unwrap();

        let err = permissify
            .add_role("editor", &["fly_group,auth,group"])
            .await
            .unwrap_err();
        assert!(matches!(err, PermissifyError::UnknownRolePermission(_)));

        let role = permissify.store().get_role("editor").await.unwrap().unwrap();
        let kept = permissify
            .store()
            .permission_edges(GranteeRef::from(&role))
            .await
            .unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_role_cascades() {
        let permissify = backend().await;
        let store = permissify.store();
        let alice = store.create_user(&NewUser::new("alice")).await.unwrap();

        let provisioned = permissify
            .add_role("editor", &["change_group,auth,group"])
            .await
            .unwrap();
        store.add_user_to_role(&alice, &provisioned.role).await.unwrap();
        assert!(permissify
            .has_permission(&alice, "auth.change_group".into(), None)
            .await
            .unwrap());

        assert!(permissify.remove_role("editor").await.unwrap());
        assert!(!permissify.remove_role("editor").await.unwrap());
        assert!(!permissify
            .has_permission(&alice, "auth.change_group".into(), None)
            .await
            .unwrap());
    }
}
