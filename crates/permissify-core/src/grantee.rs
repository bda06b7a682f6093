//! Grantees: anything that can hold permissions.
//!
//! Users, groups and roles all expose the same capability (a permission
//! collection plus a type tag for object grants), so they are addressed
//! uniformly through [`GranteeRef`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::principal::{Group, Principal, Role};

/// Type tag of a grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranteeKind {
    User,
    Group,
    Role,
}

impl GranteeKind {
    /// Every kind, in resolution order.
    pub const ALL: [GranteeKind; 3] = [GranteeKind::User, GranteeKind::Group, GranteeKind::Role];

    /// Stable tag used in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            GranteeKind::User => "user",
            GranteeKind::Group => "group",
            GranteeKind::Role => "role",
        }
    }
}

impl fmt::Display for GranteeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GranteeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(GranteeKind::User),
            "group" => Ok(GranteeKind::Group),
            "role" => Ok(GranteeKind::Role),
            other => Err(CoreError::InvalidGranteeType(other.to_string())),
        }
    }
}

/// Reference to a grantee: a type tag plus the row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GranteeRef {
    pub kind: GranteeKind,
    pub id: i64,
}

impl GranteeRef {
    pub const fn new(kind: GranteeKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for GranteeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

impl From<&Principal> for GranteeRef {
    fn from(user: &Principal) -> Self {
        Self::new(GranteeKind::User, user.id.get())
    }
}

impl From<&Group> for GranteeRef {
    fn from(group: &Group) -> Self {
        Self::new(GranteeKind::Group, group.id.get())
    }
}

impl From<&Role> for GranteeRef {
    fn from(role: &Role) -> Self {
        Self::new(GranteeKind::Role, role.id.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoleId;

    #[test]
    fn test_kind_tag_roundtrip() {
        for kind in GranteeKind::ALL {
            assert_eq!(kind.as_str().parse::<GranteeKind>().unwrap(), kind);
        }
        assert_eq!(
            "team".parse::<GranteeKind>(),
            Err(CoreError::InvalidGranteeType("team".into()))
        );
    }

    #[test]
    fn test_grantee_from_role() {
        let role = Role {
            id: RoleId(9),
            name: "auditor".into(),
        };
        let grantee = GranteeRef::from(&role);
        assert_eq!(grantee.kind, GranteeKind::Role);
        assert_eq!(grantee.id, 9);
        assert_eq!(grantee.to_string(), "role(9)");
    }
}
