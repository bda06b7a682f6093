//! Strong type definitions for Permissify.
//!
//! All identifiers are newtypes to prevent misuse at compile time: a
//! `GroupId` can never be passed where a `RoleId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the raw row id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Identifier of a user (principal).
    UserId
);
row_id!(
    /// Identifier of a directory group.
    GroupId
);
row_id!(
    /// Identifier of a role.
    RoleId
);
row_id!(
    /// Identifier of a catalog permission.
    PermissionId
);
row_id!(
    /// Identifier of a registered content type.
    ContentTypeId
);
row_id!(
    /// Identifier of a stored object grant row.
    GrantId
);

/// Primary key of a target object, stored as text.
///
/// Objects live in the host application and may use integer, UUID or
/// natural keys, so the id is kept opaque.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Create an object id from anything displayable.
    pub fn new(id: impl fmt::Display) -> Self {
        Self(id.to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for ObjectId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_display_and_debug() {
        let id = RoleId(7);
        assert_eq!(format!("{}", id), "7");
        assert_eq!(format!("{:?}", id), "RoleId(7)");
    }

    #[test]
    fn test_object_id_from_integer_matches_text() {
        assert_eq!(ObjectId::from(42), ObjectId::from("42"));
        assert_eq!(ObjectId::new(42).as_str(), "42");
    }
}
