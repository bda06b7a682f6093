//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use permissify_core::{
    ContentType, ContentTypeId, ContentTypeKey, GrantId, GranteeKind, GranteeRef, Group, GroupId,
    NaturalKey, NewObjectGrant, NewUser, ObjectGrant, ObjectGrantKey, ObjectId, ObjectRef,
    Permission, PermissionId, Principal, PrincipalQuery, Role, RoleId, UserId, AUTH_APP,
    PERMISSIFY_APP,
};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, PermissionFilter, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Last issued id per table.
    sequences: Sequences,

    content_types: BTreeMap<ContentTypeId, ContentType>,

    permissions: BTreeMap<PermissionId, StoredPermission>,

    users: BTreeMap<UserId, Principal>,

    groups: BTreeMap<GroupId, Group>,

    roles: BTreeMap<RoleId, Role>,

    /// (user, group or role) pairs.
    memberships: BTreeSet<(UserId, GranteeRef)>,

    /// Unscoped (grantee, permission) edges.
    edges: BTreeSet<(GranteeRef, PermissionId)>,

    object_grants: BTreeMap<GrantId, StoredGrant>,
}

#[derive(Default)]
struct Sequences {
    content_type: i64,
    permission: i64,
    user: i64,
    group: i64,
    role: i64,
    grant: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

struct StoredPermission {
    content_type: ContentTypeId,
    codename: String,
    name: String,
}

struct StoredGrant {
    grantee: GranteeRef,
    object_type: ContentTypeId,
    object_id: ObjectId,
    permission: PermissionId,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn content_type_id(&self, key: &ContentTypeKey) -> Option<ContentTypeId> {
        self.content_types
            .values()
            .find(|ct| ct.app_label == key.app_label && ct.model == key.model)
            .map(|ct| ct.id)
    }

    fn ensure_content_type(&mut self, key: &ContentTypeKey) -> ContentType {
        if let Some(id) = self.content_type_id(key) {
            return self.content_types[&id].clone();
        }
        let content_type = ContentType {
            id: ContentTypeId(next(&mut self.sequences.content_type)),
            app_label: key.app_label.clone(),
            model: key.model.clone(),
        };
        self.content_types
            .insert(content_type.id, content_type.clone());
        content_type
    }

    fn permission(&self, id: PermissionId) -> Option<Permission> {
        let stored = self.permissions.get(&id)?;
        let content_type = self.content_types.get(&stored.content_type)?;
        Some(Permission {
            id,
            content_type: content_type.clone(),
            codename: stored.codename.clone(),
            name: stored.name.clone(),
        })
    }

    fn find_permission(&self, predicate: impl Fn(&Permission) -> bool) -> Option<Permission> {
        self.permissions
            .keys()
            .filter_map(|id| self.permission(*id))
            .find(|p| predicate(p))
    }

    fn object_of(&self, grant: &StoredGrant) -> Option<ObjectRef> {
        let content_type = self.content_types.get(&grant.object_type)?;
        Some(ObjectRef {
            content_type: content_type.key(),
            object_id: grant.object_id.clone(),
        })
    }

    fn grant_matches_object(&self, grant: &StoredGrant, object: &ObjectRef) -> bool {
        grant.object_id == object.object_id
            && self.content_type_id(&object.content_type) == Some(grant.object_type)
    }

    fn object_grant(&self, id: GrantId, grant: &StoredGrant) -> Option<ObjectGrant> {
        Some(ObjectGrant {
            id,
            grantee: grant.grantee,
            object: self.object_of(grant)?,
            permission: self.permission(grant.permission)?,
        })
    }

    /// Grantees whose grants reach `user` through `source`.
    fn holders(&self, user: UserId, source: GranteeKind) -> BTreeSet<GranteeRef> {
        match source {
            GranteeKind::User => BTreeSet::from([GranteeRef::new(GranteeKind::User, user.get())]),
            kind => self
                .memberships
                .iter()
                .filter(|(member, target)| *member == user && target.kind == kind)
                .map(|(_, target)| *target)
                .collect(),
        }
    }

    fn grantee_exists(&self, grantee: GranteeRef) -> bool {
        match grantee.kind {
            GranteeKind::User => self.users.contains_key(&UserId(grantee.id)),
            GranteeKind::Group => self.groups.contains_key(&GroupId(grantee.id)),
            GranteeKind::Role => self.roles.contains_key(&RoleId(grantee.id)),
        }
    }

    /// Remove everything hanging off a deleted grantee that is also an
    /// object of `object_type`.
    fn cascade_grantee(&mut self, grantee: GranteeRef, object: ObjectRef) {
        self.edges.retain(|(holder, _)| *holder != grantee);
        self.memberships.retain(|(user, target)| match grantee.kind {
            GranteeKind::User => user.get() != grantee.id,
            _ => *target != grantee,
        });

        let object_type = self.content_type_id(&object.content_type);
        self.object_grants.retain(|_, grant| {
            let targets_object =
                Some(grant.object_type) == object_type && grant.object_id == object.object_id;
            grant.grantee != grantee && !targets_object
        });
    }

    fn sorted_permissions(&self, ids: BTreeSet<PermissionId>) -> Vec<Permission> {
        ids.into_iter().filter_map(|id| self.permission(id)).collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_or_create_content_type(&self, key: &ContentTypeKey) -> Result<ContentType> {
        let mut inner = self.write()?;
        Ok(inner.ensure_content_type(key))
    }

    async fn get_content_type(&self, key: &ContentTypeKey) -> Result<Option<ContentType>> {
        let inner = self.read()?;
        Ok(inner
            .content_type_id(key)
            .and_then(|id| inner.content_types.get(&id).cloned()))
    }

    async fn get_or_create_permission(
        &self,
        content_type: &ContentTypeKey,
        codename: &str,
        name: &str,
    ) -> Result<(Permission, InsertResult)> {
        let mut inner = self.write()?;
        let ct = inner.ensure_content_type(content_type);

        if let Some(existing) =
            inner.find_permission(|p| p.content_type.id == ct.id && p.codename == codename)
        {
            return Ok((existing, InsertResult::AlreadyExists));
        }

        let id = PermissionId(next(&mut inner.sequences.permission));
        inner.permissions.insert(
            id,
            StoredPermission {
                content_type: ct.id,
                codename: codename.to_string(),
                name: name.to_string(),
            },
        );
        let permission = inner
            .permission(id)
            .ok_or_else(|| StoreError::NotFound(format!("permission {}", id)))?;
        Ok((permission, InsertResult::Inserted))
    }

    async fn get_permission(&self, app_label: &str, codename: &str) -> Result<Option<Permission>> {
        let inner = self.read()?;
        Ok(inner.find_permission(|p| p.app_label() == app_label && p.codename == codename))
    }

    async fn get_permission_by_natural_key(&self, key: &NaturalKey) -> Result<Option<Permission>> {
        let inner = self.read()?;
        Ok(inner.find_permission(|p| {
            p.codename == key.codename && p.app_label() == key.app_label && p.model() == key.model
        }))
    }

    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        Ok(inner
            .permissions
            .keys()
            .filter_map(|id| inner.permission(*id))
            .filter(|p| match filter {
                PermissionFilter::All => true,
                PermissionFilter::App(app_label) => p.app_label() == app_label,
                PermissionFilter::ContentType(key) => {
                    p.app_label() == key.app_label && p.model() == key.model
                }
            })
            .collect())
    }

    async fn create_user(&self, user: &NewUser) -> Result<Principal> {
        let mut inner = self.write()?;
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::InvalidData(format!(
                "username already taken: {}",
                user.username
            )));
        }
        let principal = Principal {
            id: UserId(next(&mut inner.sequences.user)),
            username: user.username.clone(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            is_anonymous: false,
        };
        inner.users.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<Principal>> {
        let inner = self.read()?;
        Ok(inner.users.get(&id).cloned())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.users.remove(&id).is_none() {
            return Ok(false);
        }
        inner.cascade_grantee(
            GranteeRef::new(GranteeKind::User, id.get()),
            ObjectRef::new(AUTH_APP, "user", id.get()),
        );
        Ok(true)
    }

    async fn create_group(&self, name: &str) -> Result<Group> {
        let mut inner = self.write()?;
        if inner.groups.values().any(|g| g.name == name) {
            return Err(StoreError::InvalidData(format!(
                "group name already taken: {}",
                name
            )));
        }
        let group = Group {
            id: GroupId(next(&mut inner.sequences.group)),
            name: name.to_string(),
        };
        inner.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: GroupId) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.groups.remove(&id).is_none() {
            return Ok(false);
        }
        inner.cascade_grantee(
            GranteeRef::new(GranteeKind::Group, id.get()),
            ObjectRef::new(AUTH_APP, "group", id.get()),
        );
        Ok(true)
    }

    async fn get_or_create_role(&self, name: &str) -> Result<(Role, InsertResult)> {
        let mut inner = self.write()?;
        if let Some(role) = inner.roles.values().find(|r| r.name == name) {
            return Ok((role.clone(), InsertResult::AlreadyExists));
        }
        let role = Role {
            id: RoleId(next(&mut inner.sequences.role)),
            name: name.to_string(),
        };
        inner.roles.insert(role.id, role.clone());
        Ok((role, InsertResult::Inserted))
    }

    async fn get_role(&self, name: &str) -> Result<Option<Role>> {
        let inner = self.read()?;
        Ok(inner.roles.values().find(|r| r.name == name).cloned())
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.roles.remove(&id).is_none() {
            return Ok(false);
        }
        inner.cascade_grantee(
            GranteeRef::new(GranteeKind::Role, id.get()),
            ObjectRef::new(PERMISSIFY_APP, "role", id.get()),
        );
        Ok(true)
    }

    async fn add_membership(&self, user: UserId, target: GranteeRef) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if target.kind == GranteeKind::User {
            return Err(StoreError::InvalidData(format!(
                "users cannot be members of {}",
                target
            )));
        }
        if !inner.users.contains_key(&user) {
            return Err(StoreError::NotFound(format!("user {}", user)));
        }
        if !inner.grantee_exists(target) {
            return Err(StoreError::NotFound(target.to_string()));
        }
        if inner.memberships.insert((user, target)) {
            Ok(InsertResult::Inserted)
        } else {
            Ok(InsertResult::AlreadyExists)
        }
    }

    async fn remove_membership(&self, user: UserId, target: GranteeRef) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.memberships.remove(&(user, target)))
    }

    async fn memberships(&self, user: UserId, kind: GranteeKind) -> Result<Vec<GranteeRef>> {
        let inner = self.read()?;
        if kind == GranteeKind::User {
            return Ok(Vec::new());
        }
        Ok(inner.holders(user, kind).into_iter().collect())
    }

    async fn add_permission_edge(
        &self,
        grantee: GranteeRef,
        permission: PermissionId,
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if !inner.grantee_exists(grantee) {
            return Err(StoreError::NotFound(grantee.to_string()));
        }
        if !inner.permissions.contains_key(&permission) {
            return Err(StoreError::NotFound(format!("permission {}", permission)));
        }
        if inner.edges.insert((grantee, permission)) {
            Ok(InsertResult::Inserted)
        } else {
            Ok(InsertResult::AlreadyExists)
        }
    }

    async fn remove_permission_edge(
        &self,
        grantee: GranteeRef,
        permission: PermissionId,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.edges.remove(&(grantee, permission)))
    }

    async fn replace_permission_edges(
        &self,
        grantee: GranteeRef,
        permissions: &[PermissionId],
    ) -> Result<usize> {
        let mut inner = self.write()?;
        if !inner.grantee_exists(grantee) {
            return Err(StoreError::NotFound(grantee.to_string()));
        }
        if let Some(missing) = permissions
            .iter()
            .find(|id| !inner.permissions.contains_key(*id))
        {
            return Err(StoreError::NotFound(format!("permission {}", missing)));
        }

        let before = inner.edges.len();
        inner.edges.retain(|(holder, _)| *holder != grantee);
        let removed = before - inner.edges.len();
        inner
            .edges
            .extend(permissions.iter().map(|permission| (grantee, *permission)));
        Ok(removed)
    }

    async fn permission_edges(&self, grantee: GranteeRef) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        let ids = inner
            .edges
            .iter()
            .filter(|(holder, _)| *holder == grantee)
            .map(|(_, permission)| *permission)
            .collect();
        Ok(inner.sorted_permissions(ids))
    }

    async fn get_or_create_object_grant(
        &self,
        grant: &NewObjectGrant,
    ) -> Result<(ObjectGrant, InsertResult)> {
        let mut inner = self.write()?;
        if !inner.grantee_exists(grant.grantee) {
            return Err(StoreError::NotFound(grant.grantee.to_string()));
        }
        if !inner.permissions.contains_key(&grant.permission.id) {
            return Err(StoreError::NotFound(format!(
                "permission {}",
                grant.permission.id
            )));
        }

        let object = grant.object();
        let object_type = inner.ensure_content_type(&object.content_type).id;

        let existing = inner.object_grants.iter().find(|(_, stored)| {
            stored.grantee == grant.grantee
                && stored.object_type == object_type
                && stored.object_id == object.object_id
                && stored.permission == grant.permission.id
        });
        if let Some((id, stored)) = existing {
            let found = inner
                .object_grant(*id, stored)
                .ok_or_else(|| StoreError::NotFound(format!("object grant {}", id)))?;
            return Ok((found, InsertResult::AlreadyExists));
        }

        let id = GrantId(next(&mut inner.sequences.grant));
        let stored = StoredGrant {
            grantee: grant.grantee,
            object_type,
            object_id: object.object_id.clone(),
            permission: grant.permission.id,
        };
        let created = inner
            .object_grant(id, &stored)
            .ok_or_else(|| StoreError::NotFound(format!("object grant {}", id)))?;
        inner.object_grants.insert(id, stored);
        Ok((created, InsertResult::Inserted))
    }

    async fn delete_object_grant(&self, key: &ObjectGrantKey) -> Result<bool> {
        let mut inner = self.write()?;
        let Some(object_type) = inner.content_type_id(&key.object.content_type) else {
            return Ok(false);
        };
        let before = inner.object_grants.len();
        inner.object_grants.retain(|_, stored| {
            !(stored.grantee == key.grantee
                && stored.object_type == object_type
                && stored.object_id == key.object.object_id
                && stored.permission == key.permission)
        });
        Ok(inner.object_grants.len() < before)
    }

    async fn object_grants_for(&self, object: &ObjectRef) -> Result<Vec<ObjectGrant>> {
        let inner = self.read()?;
        Ok(inner
            .object_grants
            .iter()
            .filter(|(_, stored)| inner.grant_matches_object(stored, object))
            .filter_map(|(id, stored)| inner.object_grant(*id, stored))
            .collect())
    }

    async fn delete_object_grants_for(&self, object: &ObjectRef) -> Result<usize> {
        let mut inner = self.write()?;
        let Some(object_type) = inner.content_type_id(&object.content_type) else {
            return Ok(0);
        };
        let before = inner.object_grants.len();
        inner.object_grants.retain(|_, stored| {
            !(stored.object_type == object_type && stored.object_id == object.object_id)
        });
        Ok(before - inner.object_grants.len())
    }

    async fn granted_permissions(
        &self,
        user: UserId,
        source: GranteeKind,
    ) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        let holders = inner.holders(user, source);
        let ids = inner
            .edges
            .iter()
            .filter(|(holder, _)| holders.contains(holder))
            .map(|(_, permission)| *permission)
            .collect();
        Ok(inner.sorted_permissions(ids))
    }

    async fn object_granted_permissions(
        &self,
        user: UserId,
        source: GranteeKind,
        object: &ObjectRef,
    ) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        let holders = inner.holders(user, source);
        let ids = inner
            .object_grants
            .values()
            .filter(|stored| holders.contains(&stored.grantee))
            .filter(|stored| inner.grant_matches_object(stored, object))
            .map(|stored| stored.permission)
            .collect();
        Ok(inner.sorted_permissions(ids))
    }

    async fn filter_principals(&self, query: &PrincipalQuery) -> Result<Vec<Principal>> {
        let inner = self.read()?;

        let sources: Vec<GranteeKind> = GranteeKind::ALL
            .into_iter()
            .filter(|kind| query.include_roles || *kind != GranteeKind::Role)
            .collect();

        let matches = |id: PermissionId| {
            inner
                .permission(id)
                .map_or(false, |p| query.permission.matches(&p))
        };

        let principals = inner
            .users
            .values()
            .filter(|user| {
                let holds_grant = sources.iter().any(|source| {
                    let holders = inner.holders(user.id, *source);
                    match &query.object {
                        Some(object) => inner.object_grants.values().any(|stored| {
                            holders.contains(&stored.grantee)
                                && inner.grant_matches_object(stored, object)
                                && matches(stored.permission)
                        }),
                        None => inner
                            .edges
                            .iter()
                            .any(|(holder, id)| holders.contains(holder) && matches(*id)),
                    }
                });
                query.admits(user, holds_grant)
            })
            .cloned()
            .collect();

        Ok(principals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use permissify_core::PermissionMatch;

    async fn store_with_groups() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .register_model(&ContentTypeKey::new("auth", "group"), &[])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_memory_store_register_model() {
        let store = store_with_groups().await;
        let perms = store
            .list_permissions(&PermissionFilter::ContentType(ContentTypeKey::new(
                "auth", "group",
            )))
            .await
            .unwrap();
        let names: Vec<String> = perms.iter().map(|p| p.full_name()).collect();
        assert_eq!(
            names,
            vec![
                "auth.add_group",
                "auth.change_group",
                "auth.delete_group",
                "auth.view_group"
            ]
        );
    }

    #[tokio::test]
    async fn test_memory_store_edges_idempotent() {
        let store = store_with_groups().await;
        let user = store.create_user(&NewUser::new("alice")).await.unwrap();
        let perm = store
            .get_permission("auth", "change_group")
            .await
            .unwrap()
            .unwrap();
        let grantee = GranteeRef::from(&user);

        let r1 = store.add_permission_edge(grantee, perm.id).await.unwrap();
        let r2 = store.add_permission_edge(grantee, perm.id).await.unwrap();
        assert_eq!(r1, InsertResult::Inserted);
        assert_eq!(r2, InsertResult::AlreadyExists);

        assert!(store.remove_permission_edge(grantee, perm.id).await.unwrap());
        assert!(!store.remove_permission_edge(grantee, perm.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_object_grant_unique() {
        let store = store_with_groups().await;
        let user = store.create_user(&NewUser::new("alice")).await.unwrap();
        let group = store.create_group("staff").await.unwrap();
        let perm = store
            .get_permission("auth", "change_group")
            .await
            .unwrap()
            .unwrap();

        let target = ObjectRef::new("auth", "group", group.id.get());
        let new = NewObjectGrant::for_object(GranteeRef::from(&user), perm, &target);

        let (first, r1) = store.get_or_create_object_grant(&new).await.unwrap();
        let (second, r2) = store.get_or_create_object_grant(&new).await.unwrap();
        assert_eq!(r1, InsertResult::Inserted);
        assert_eq!(r2, InsertResult::AlreadyExists);
        assert_eq!(first.id, second.id);
        assert_eq!(store.object_grants_for(&target).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_delete_role_cascades() {
        let store = MemoryStore::new();
        let role_ct = ContentTypeKey::new("permissify", "role");
        store.register_model(&role_ct, &[]).await.unwrap();

        let user = store.create_user(&NewUser::new("bob")).await.unwrap();
        let (role, _) = store.get_or_create_role("editor").await.unwrap();
        let (other, _) = store.get_or_create_role("viewer").await.unwrap();
        store.add_user_to_role(&user, &role).await.unwrap();

        let view_role = store
            .get_permission("permissify", "view_role")
            .await
            .unwrap()
            .unwrap();
        store
            .add_permission_edge(GranteeRef::from(&role), view_role.id)
            .await
            .unwrap();
        // A grant held by another role on the deleted role object.
        let on_role = ObjectRef::new("permissify", "role", role.id.get());
        store
            .get_or_create_object_grant(&NewObjectGrant::for_object(
                GranteeRef::from(&other),
                view_role.clone(),
                &on_role,
            ))
            .await
            .unwrap();

        assert!(store.delete_role(role.id).await.unwrap());
        assert!(!store.delete_role(role.id).await.unwrap());

        assert!(store
            .memberships(user.id, GranteeKind::Role)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .permission_edges(GranteeRef::from(&role))
            .await
            .unwrap()
            .is_empty());
        assert!(store.object_grants_for(&on_role).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_filter_principals() {
        let store = store_with_groups().await;
        let alice = store.create_user(&NewUser::new("alice")).await.unwrap();
        let root = store
            .create_user(&NewUser::new("root").superuser())
            .await
            .unwrap();
        let perm = store
            .get_permission("auth", "change_group")
            .await
            .unwrap()
            .unwrap();
        store
            .add_permission_edge(GranteeRef::from(&alice), perm.id)
            .await
            .unwrap();

        let query = PrincipalQuery::new(PermissionMatch::Id(perm.id));
        let all = store.filter_principals(&query).await.unwrap();
        assert_eq!(all, vec![alice.clone(), root]);

        let without_super = store
            .filter_principals(&query.include_superusers(false))
            .await
            .unwrap();
        assert_eq!(without_super, vec![alice]);
    }
}
