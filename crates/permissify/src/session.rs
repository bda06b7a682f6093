//! Request-scoped sessions.
//!
//! A [`Session`] pairs the backend with one [`ResolutionContext`]. Grants
//! and revokes made through the session invalidate the affected entries.

use std::collections::HashSet;

use permissify_core::{GranteeKind, GranteeRef, ObjectRef, PermissionRef, Principal, UserId};
use permissify_perms::{GrantReport, GrantService, ResolutionContext};
use permissify_store::Store;
use tracing::trace;

use crate::backend::Permissify;
use crate::error::Result;

/// Backend plus memoized resolution state for one request.
pub struct Session<'a, S> {
    backend: &'a Permissify<S>,
    ctx: ResolutionContext,
}

impl<'a, S: Store + 'static> Session<'a, S> {
    pub fn new(backend: &'a Permissify<S>) -> Self {
        Self {
            backend,
            ctx: ResolutionContext::new(),
        }
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.ctx
    }

    pub async fn has_permission(
        &mut self,
        principal: &Principal,
        permission: impl Into<PermissionRef>,
        object: Option<&ObjectRef>,
    ) -> Result<bool> {
        let permission = permission.into();
        Ok(self
            .backend
            .engine()
            .has_permission(&mut self.ctx, principal, &permission, object)
            .await?)
    }

    pub async fn get_all_permissions(
        &mut self,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        Ok(self
            .backend
            .engine()
            .get_all_permissions(&mut self.ctx, principal, object)
            .await?)
    }

    pub async fn get_user_permissions(
        &mut self,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        Ok(self
            .backend
            .engine()
            .get_user_permissions(&mut self.ctx, principal, object)
            .await?)
    }

    pub async fn get_group_permissions(
        &mut self,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        Ok(self
            .backend
            .engine()
            .get_group_permissions(&mut self.ctx, principal, object)
            .await?)
    }

    pub async fn get_role_permissions(
        &mut self,
        principal: &Principal,
        object: Option<&ObjectRef>,
    ) -> Result<HashSet<String>> {
        Ok(self
            .backend
            .engine()
            .get_role_permissions(&mut self.ctx, principal, object)
            .await?)
    }

    pub async fn grant(
        &mut self,
        grantee: GranteeRef,
        permission: impl Into<PermissionRef>,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport> {
        let report = GrantService::new(self.backend.store())
            .grant(grantee, &permission.into(), object)
            .await;
        // A failed bulk grant may still have written some rows.
        self.invalidate(grantee);
        Ok(report?)
    }

    pub async fn revoke(
        &mut self,
        grantee: GranteeRef,
        permission: impl Into<PermissionRef>,
        object: Option<&ObjectRef>,
    ) -> Result<GrantReport> {
        let report = GrantService::new(self.backend.store())
            .revoke(grantee, &permission.into(), object)
            .await;
        // A failed bulk revoke may still have written some rows.
        self.invalidate(grantee);
        Ok(report?)
    }

    /// Group and role grants fan out to unknown members, so they drop
    /// everything.
    fn invalidate(&mut self, grantee: GranteeRef) {
        match grantee.kind {
            GranteeKind::User => {
                let dropped = self.ctx.invalidate(UserId(grantee.id));
                trace!(%grantee, dropped, "invalidated cached permissions");
            }
            GranteeKind::Group | GranteeKind::Role => {
                trace!(%grantee, dropped = self.ctx.len(), "cleared cached permissions");
                self.ctx.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PermissifyConfig;
    use permissify_core::NewUser;
    use permissify_store::{MemoryStore, StoreExt};

    #[tokio::test]
    async fn test_session_grant_invalidates_user() {
        let permissify = Permissify::new(MemoryStore::new(), PermissifyConfig::default());
        permissify.install_default_catalog().await.unwrap();
        let alice = permissify
            .store()
            .create_user(&NewUser::new("alice"))
            .await
            .unwrap();
        let bob = permissify
            .store()
            .create_user(&NewUser::new("bob"))
            .await
            .unwrap();

        let mut session = permissify.session();
        assert!(!session
            .has_permission(&alice, "auth.view_user", None)
            .await
            .unwrap());
        session.get_all_permissions(&bob, None).await.unwrap();

        session
            .grant(GranteeRef::from(&alice), "auth.view_user", None)
            .await
            .unwrap();
        assert!(session
            .has_permission(&alice, "auth.view_user", None)
            .await
            .unwrap());
        // Bob's entries survive a user-targeted grant.
        assert!(!session.context().is_empty());
    }

    #[tokio::test]
    async fn test_session_group_grant_clears_context() {
        let permissify = Permissify::new(MemoryStore::new(), PermissifyConfig::default());
        permissify.install_default_catalog().await.unwrap();
        let store = permissify.store();
        let alice = store.create_user(&NewUser::new("alice")).await.unwrap();
        let group = store.create_group("staff").await.unwrap();
        store.add_user_to_group(&alice, &group).await.unwrap();

        let mut session = permissify.session();
        assert!(session
            .get_group_permissions(&alice, None)
            .await
            .unwrap()
            .is_empty());

        session
            .grant(GranteeRef::from(&group), "auth.change_group", None)
            .await
            .unwrap();
        assert!(session.context().is_empty());
        assert!(session
            .has_permission(&alice, "auth.change_group", None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_session_failed_grant_still_invalidates() {
        let permissify = Permissify::new(MemoryStore::new(), PermissifyConfig::default());
        permissify.install_default_catalog().await.unwrap();
        let alice = permissify
            .store()
            .create_user(&NewUser::new("alice"))
            .await
            .unwrap();

        let mut session = permissify.session();
        session.get_all_permissions(&alice, None).await.unwrap();
        assert!(!session.context().is_empty());

        let missing = GranteeRef::new(GranteeKind::Group, 999);
        assert!(session.grant(missing, "auth.view_user", None).await.is_err());
        assert!(session.context().is_empty());

        session.get_all_permissions(&alice, None).await.unwrap();
        assert!(session.revoke(missing, "auth.nope_user", None).await.is_err());
        assert!(session.context().is_empty());
    }
}
