//! Directory entities: principals, groups and roles.
//!
//! Memberships (user → group, user → role) are relationships owned by the
//! store; these structs only carry identity and flags.

use serde::{Deserialize, Serialize};

use crate::object::{AsObject, ObjectRef};
use crate::types::{GroupId, RoleId, UserId};

/// App label of the built-in directory models.
pub const AUTH_APP: &str = "auth";

/// App label of the role model.
pub const PERMISSIFY_APP: &str = "permissify";

/// The acting identity whose authorization is being checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_anonymous: bool,
}

impl Principal {
    /// The unauthenticated principal. Holds no permissions.
    pub fn anonymous() -> Self {
        Self {
            id: UserId(0),
            username: String::new(),
            is_active: false,
            is_superuser: false,
            is_anonymous: true,
        }
    }

    /// Whether resolution may consider this principal's grants at all.
    pub fn can_hold_permissions(&self) -> bool {
        self.is_active && !self.is_anonymous
    }
}

impl AsObject for Principal {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(AUTH_APP, "user", self.id.get())
    }
}

/// Parameters for creating a user in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl NewUser {
    /// An active, non-superuser account.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_active: true,
            is_superuser: false,
        }
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A directory group. Members inherit its permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl AsObject for Group {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(AUTH_APP, "group", self.id.get())
    }
}

/// A named bundle of permissions, assignable to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl AsObject for Role {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(PERMISSIFY_APP, "role", self.id.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_cannot_hold_permissions() {
        let anon = Principal::anonymous();
        assert!(anon.is_anonymous);
        assert!(!anon.can_hold_permissions());
    }

    #[test]
    fn test_new_user_builders() {
        let user = NewUser::new("alice").superuser().inactive();
        assert!(user.is_superuser);
        assert!(!user.is_active);
    }

    #[test]
    fn test_directory_object_refs() {
        let role = Role {
            id: RoleId(4),
            name: "editor".into(),
        };
        assert_eq!(role.object_ref(), ObjectRef::new("permissify", "role", 4));

        let group = Group {
            id: GroupId(4),
            name: "staff".into(),
        };
        assert_eq!(group.object_ref(), ObjectRef::new("auth", "group", 4));
    }
}
