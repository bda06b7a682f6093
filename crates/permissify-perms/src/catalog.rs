//! Catalog resolution: turning permission references into catalog rows.
//!
//! [`Catalog::resolve`] handles single references. [`Catalog::expand`] also
//! accepts the bulk forms understood by grant and revoke (wildcards, comma
//! lists, reference lists) and flattens them in order.

use permissify_core::{
    bare_action_key, parse_permission_name, ObjectRef, Permission, PermissionRef, Specifier,
};
use permissify_store::{PermissionFilter, Store};

use crate::error::{PermsError, Result};

/// Resolves permission references against a store's catalog.
pub struct Catalog<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> Catalog<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve a single reference to its catalog permission.
    ///
    /// Bare actions such as `"view"` take their model from `object`.
    pub async fn resolve(
        &self,
        permission: &PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<Permission> {
        let found = match permission {
            PermissionRef::Name(name) if name.contains('.') => {
                let (app_label, codename) = parse_permission_name(name)?;
                self.store.get_permission(app_label, codename).await?
            }
            PermissionRef::Name(action) => {
                let key = bare_action_key(action, object)?;
                self.store.get_permission_by_natural_key(&key).await?
            }
            PermissionRef::NaturalKey(key) => {
                self.store.get_permission_by_natural_key(key).await?
            }
            PermissionRef::Resolved(permission) => Some(permission.clone()),
            other => {
                return Err(PermsError::InvalidPermissionType(format!(
                    "expected a single permission, got {}",
                    other.form()
                )))
            }
        };

        found.ok_or_else(|| {
            PermsError::InvalidPermissionReference(format!(
                "no such permission: {}",
                describe(permission, object)
            ))
        })
    }

    /// Expand a reference into every permission it names, in order.
    ///
    /// Wildcards are evaluated against the catalog as it is now; the result
    /// is a snapshot.
    pub async fn expand(
        &self,
        permission: &PermissionRef,
        object: Option<&ObjectRef>,
    ) -> Result<Vec<Permission>> {
        let mut pending = vec![permission.clone()];
        let mut expanded = Vec::new();

        while let Some(next) = pending.pop() {
            match next {
                PermissionRef::List(items) => pending.extend(items.into_iter().rev()),
                PermissionRef::Grant(_) => {
                    return Err(PermsError::InvalidPermissionType(
                        "an object grant cannot be granted or revoked".into(),
                    ))
                }
                PermissionRef::Name(name) => match Specifier::parse(&name, object.is_some())? {
                    Specifier::AllForObject => {
                        let object = object.ok_or_else(|| {
                            PermsError::InvalidPermissionReference(format!(
                                "{:?} requires a target object",
                                name
                            ))
                        })?;
                        let filter = PermissionFilter::ContentType(object.content_type.clone());
                        expanded.extend(self.store.list_permissions(&filter).await?);
                    }
                    Specifier::AllInApp { app_label } => {
                        let filter = PermissionFilter::App(app_label);
                        expanded.extend(self.store.list_permissions(&filter).await?);
                    }
                    Specifier::AllForModel(content_type) => {
                        if self.store.get_content_type(&content_type).await?.is_none() {
                            return Err(PermsError::InvalidPermissionReference(format!(
                                "unknown content type {} in {:?}",
                                content_type, name
                            )));
                        }
                        let filter = PermissionFilter::ContentType(content_type);
                        expanded.extend(self.store.list_permissions(&filter).await?);
                    }
                    Specifier::Fragments(fragments) => {
                        for fragment in fragments.into_iter().rev() {
                            if fragment.is_empty() {
                                return Err(PermsError::InvalidPermissionReference(format!(
                                    "empty entry in permission list {:?}",
                                    name
                                )));
                            }
                            pending.push(PermissionRef::Name(fragment));
                        }
                    }
                    Specifier::Single => {
                        let single = PermissionRef::Name(name);
                        expanded.push(self.resolve(&single, object).await?);
                    }
                },
                single => expanded.push(self.resolve(&single, object).await?),
            }
        }

        Ok(expanded)
    }
}

/// Canonical `"app_label.codename"` for read-side checks, without a catalog
/// lookup.
pub fn permission_name(permission: &PermissionRef, object: Option<&ObjectRef>) -> Result<String> {
    Ok(permission.canonical_name(object)?)
}

fn describe(permission: &PermissionRef, object: Option<&ObjectRef>) -> String {
    permission
        .canonical_name(object)
        .unwrap_or_else(|_| format!("{:?}", permission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use permissify_core::{ContentTypeKey, NaturalKey};
    use permissify_store::{MemoryStore, StoreExt};

    async fn catalog_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .register_model(&ContentTypeKey::new("auth", "group"), &[])
            .await
            .unwrap();
        store
            .register_model(&ContentTypeKey::new("auth", "user"), &[])
            .await
            .unwrap();
        store
            .register_model(&ContentTypeKey::new("permissify", "role"), &["publish"])
            .await
            .unwrap();
        store
    }

    fn names(perms: &[Permission]) -> Vec<String> {
        perms.iter().map(Permission::full_name).collect()
    }

    #[tokio::test]
    async fn test_resolve_forms() {
        let store = catalog_store().await;
        let catalog = Catalog::new(&store);
        let role = ObjectRef::new("permissify", "role", 1);

        let by_name = catalog.resolve(&"auth.change_group".into(), None).await.unwrap();
        assert_eq!(by_name.full_name(), "auth.change_group");

        let bare = catalog.resolve(&"view".into(), Some(&role)).await.unwrap();
        assert_eq!(bare.full_name(), "permissify.view_role");

        let custom = catalog.resolve(&"publish".into(), Some(&role)).await.unwrap();
        assert_eq!(custom.full_name(), "permissify.publish");

        let key = NaturalKey::new("delete_user", "auth", "user");
        let natural = catalog.resolve(&key.into(), None).await.unwrap();
        assert_eq!(natural.full_name(), "auth.delete_user");

        let passthrough = catalog.resolve(&(&by_name).into(), None).await.unwrap();
        assert_eq!(passthrough, by_name);
    }

    #[tokio::test]
    async fn test_resolve_errors() {
        let store = catalog_store().await;
        let catalog = Catalog::new(&store);

        let unknown = catalog.resolve(&"auth.fly_group".into(), None).await;
        assert!(matches!(unknown, Err(PermsError::InvalidPermissionReference(_))));

        let bare = catalog.resolve(&"view".into(), None).await;
        assert!(matches!(bare, Err(PermsError::InvalidPermissionReference(_))));

        let malformed = catalog.resolve(&"a.b.c".into(), None).await;
        assert!(matches!(malformed, Err(PermsError::InvalidPermissionReference(_))));

        let list = catalog
            .resolve(&vec!["auth.view_group"].into(), None)
            .await;
        assert!(matches!(list, Err(PermsError::InvalidPermissionType(_))));
    }

    #[tokio::test]
    async fn test_expand_app_wildcard() {
        let store = catalog_store().await;
        let catalog = Catalog::new(&store);

        let perms = catalog.expand(&"auth.*".into(), None).await.unwrap();
        assert_eq!(perms.len(), 8);
        assert!(perms.iter().all(|p| p.app_label() == "auth"));

        let same = catalog.expand(&"auth.__all__".into(), None).await.unwrap();
        assert_eq!(perms, same);
    }

    #[tokio::test]
    async fn test_expand_model_wildcard() {
        let store = catalog_store().await;
        let catalog = Catalog::new(&store);

        let perms = catalog.expand(&"permissify.*_role".into(), None).await.unwrap();
        assert_eq!(
            names(&perms),
            vec![
                "permissify.add_role",
                "permissify.change_role",
                "permissify.delete_role",
                "permissify.view_role",
                "permissify.publish",
            ]
        );

        let unknown = catalog.expand(&"auth.*_widget".into(), None).await;
        assert!(matches!(unknown, Err(PermsError::InvalidPermissionReference(_))));
    }

    #[tokio::test]
    async fn test_expand_object_wildcard() {
        let store = catalog_store().await;
        let catalog = Catalog::new(&store);
        let group = ObjectRef::new("auth", "group", 7);

        let all = catalog.expand(&"__all__".into(), Some(&group)).await.unwrap();
        let star = catalog.expand(&"*".into(), Some(&group)).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all, star);

        let missing = catalog.expand(&"__all__".into(), None).await;
        assert!(matches!(missing, Err(PermsError::InvalidPermissionReference(_))));
    }

    #[tokio::test]
    async fn test_expand_lists_preserve_order() {
        let store = catalog_store().await;
        let catalog = Catalog::new(&store);

        let nested = PermissionRef::List(vec![
            "auth.view_user, auth.add_group".into(),
            PermissionRef::List(vec!["auth.delete_group".into()]),
            ("change_user", "auth", "user").into(),
        ]);
        let perms = catalog.expand(&nested, None).await.unwrap();
        assert_eq!(
            names(&perms),
            vec![
                "auth.view_user",
                "auth.add_group",
                "auth.delete_group",
                "auth.change_user"
            ]
        );

        let empty_fragment = catalog.expand(&"auth.view_user,,".into(), None).await;
        assert!(matches!(
            empty_fragment,
            Err(PermsError::InvalidPermissionReference(_))
        ));
    }

    #[test]
    fn test_permission_name_without_catalog() {
        let name = permission_name(&"auth.never_registered".into(), None).unwrap();
        assert_eq!(name, "auth.never_registered");

        let role = ObjectRef::new("permissify", "role", 3);
        assert_eq!(
            permission_name(&"change".into(), Some(&role)).unwrap(),
            "permissify.change_role"
        );
    }
}
