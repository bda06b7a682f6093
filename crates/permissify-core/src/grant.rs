//! Object-scoped grants.
//!
//! An object grant binds one permission to one target object for one
//! grantee. The tuple `(grantee_type, grantee_id, object_type, object_id,
//! permission)` is unique: granting twice never produces a second row.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::grantee::GranteeRef;
use crate::object::{ContentTypeKey, ObjectRef};
use crate::permission::Permission;
use crate::types::{GrantId, ObjectId, PermissionId};

/// A stored object grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectGrant {
    pub id: GrantId,
    pub grantee: GranteeRef,
    pub object: ObjectRef,
    pub permission: Permission,
}

impl ObjectGrant {
    pub fn key(&self) -> ObjectGrantKey {
        ObjectGrantKey {
            grantee: self.grantee,
            object: self.object.clone(),
            permission: self.permission.id,
        }
    }
}

impl fmt::Display for ObjectGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) | {}",
            self.permission, self.object.object_id, self.grantee
        )
    }
}

/// The uniqueness key of an object grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectGrantKey {
    pub grantee: GranteeRef,
    pub object: ObjectRef,
    pub permission: PermissionId,
}

/// An object grant about to be created.
///
/// When no object type is supplied the permission's own content type is
/// used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewObjectGrant {
    pub grantee: GranteeRef,
    pub permission: Permission,
    pub object_id: ObjectId,
    pub object_type: Option<ContentTypeKey>,
}

impl NewObjectGrant {
    /// A grant whose object type defaults to the permission's model.
    pub fn new(grantee: GranteeRef, permission: Permission, object_id: impl Into<ObjectId>) -> Self {
        Self {
            grantee,
            permission,
            object_id: object_id.into(),
            object_type: None,
        }
    }

    /// A grant on a fully identified object.
    pub fn for_object(grantee: GranteeRef, permission: Permission, object: &ObjectRef) -> Self {
        Self {
            grantee,
            permission,
            object_id: object.object_id.clone(),
            object_type: Some(object.content_type.clone()),
        }
    }

    /// The effective object type.
    pub fn object_type(&self) -> ContentTypeKey {
        match &self.object_type {
            Some(key) => key.clone(),
            None => self.permission.content_type.key(),
        }
    }

    /// The effective target object.
    pub fn object(&self) -> ObjectRef {
        ObjectRef {
            content_type: self.object_type(),
            object_id: self.object_id.clone(),
        }
    }

    pub fn key(&self) -> ObjectGrantKey {
        ObjectGrantKey {
            grantee: self.grantee,
            object: self.object(),
            permission: self.permission.id,
        }
    }
}
