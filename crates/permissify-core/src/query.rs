//! Principal-set queries ("which users hold permission P").
//!
//! A [`PrincipalQuery`] only describes the filter. Stores evaluate it, so
//! building one never touches storage.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::object::ObjectRef;
use crate::permission::Permission;
use crate::principal::Principal;
use crate::reference::{parse_permission_name, PermissionRef};
use crate::types::PermissionId;

/// How the queried permission is matched against grant rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionMatch {
    /// Exact catalog row.
    Id(PermissionId),
    /// By canonical name.
    Name { app_label: String, codename: String },
}

impl PermissionMatch {
    /// Build a matcher from a reference.
    ///
    /// Accepts canonical names and resolved permissions. Object grants are
    /// accepted only for object-scoped queries, where they stand for their
    /// permission.
    pub fn from_ref(permission: &PermissionRef, object: Option<&ObjectRef>) -> Result<Self> {
        match permission {
            PermissionRef::Name(name) => {
                let (app_label, codename) = parse_permission_name(name)?;
                Ok(PermissionMatch::Name {
                    app_label: app_label.to_string(),
                    codename: codename.to_string(),
                })
            }
            PermissionRef::Resolved(permission) => Ok(PermissionMatch::Id(permission.id)),
            PermissionRef::Grant(grant) if object.is_some() => {
                Ok(PermissionMatch::Id(grant.permission.id))
            }
            other => Err(CoreError::InvalidPermissionType(format!(
                "expected a permission name or permission{}, got {}",
                if object.is_some() { " or object grant" } else { "" },
                other.form()
            ))),
        }
    }

    pub fn matches(&self, permission: &Permission) -> bool {
        match self {
            PermissionMatch::Id(id) => permission.id == *id,
            PermissionMatch::Name {
                app_label,
                codename,
            } => permission.app_label() == app_label && &permission.codename == codename,
        }
    }
}

/// A lazily evaluated filter over principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalQuery {
    pub permission: PermissionMatch,
    /// Restrict grants to this object instead of unscoped edges.
    pub object: Option<ObjectRef>,
    /// Also admit every superuser.
    pub include_superusers: bool,
    /// Required `is_active` value, or `None` for no constraint.
    pub active: Option<bool>,
    /// Whether role grants participate.
    pub include_roles: bool,
}

impl PrincipalQuery {
    /// Query with the default flags: superusers included, active only,
    /// roles considered.
    pub fn new(permission: PermissionMatch) -> Self {
        Self {
            permission,
            object: None,
            include_superusers: true,
            active: Some(true),
            include_roles: true,
        }
    }

    pub fn on_object(mut self, object: Option<ObjectRef>) -> Self {
        self.object = object;
        self
    }

    pub fn include_superusers(mut self, include: bool) -> Self {
        self.include_superusers = include;
        self
    }

    pub fn active(mut self, active: Option<bool>) -> Self {
        self.active = active;
        self
    }

    pub fn include_roles(mut self, include: bool) -> Self {
        self.include_roles = include;
        self
    }

    /// Final admission test given whether the principal holds a matching
    /// grant through any path.
    pub fn admits(&self, principal: &Principal, holds_grant: bool) -> bool {
        let granted = holds_grant || (self.include_superusers && principal.is_superuser);
        let active_ok = self.active.map_or(true, |active| principal.is_active == active);
        granted && active_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn user(is_active: bool, is_superuser: bool) -> Principal {
        Principal {
            id: UserId(1),
            username: "u".into(),
            is_active,
            is_superuser,
            is_anonymous: false,
        }
    }

    #[test]
    fn test_from_ref_rejects_malformed_name() {
        let err = PermissionMatch::from_ref(&"change_group".into(), None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPermissionReference(_)));
    }

    #[test]
    fn test_from_ref_rejects_natural_key() {
        let err =
            PermissionMatch::from_ref(&("change_group", "auth", "group").into(), None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPermissionType(_)));
    }

    #[test]
    fn test_admits_flags() {
        let query = PermissionMatch::Id(PermissionId(1));
        let query = PrincipalQuery::new(query);

        assert!(query.admits(&user(true, false), true));
        assert!(!query.admits(&user(true, false), false));
        assert!(query.admits(&user(true, true), false));
        assert!(!query.admits(&user(false, false), true));

        let strict = query.clone().include_superusers(false);
        assert!(!strict.admits(&user(true, true), false));

        let any_activity = query.active(None);
        assert!(any_activity.admits(&user(false, false), true));
    }
}
