//! Content types and target objects.
//!
//! A content type names a kind of resource as `(app_label, model)`. An
//! [`ObjectRef`] pairs a content type with an object's primary key and is
//! the only way objects cross into the engine: there is no dynamic type
//! inspection at the storage boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ContentTypeId, ObjectId};

/// Natural key of a content type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentTypeKey {
    /// Application namespace, e.g. `"auth"`.
    pub app_label: String,
    /// Lowercase model name, e.g. `"group"`.
    pub model: String,
}

impl ContentTypeKey {
    pub fn new(app_label: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ContentTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model)
    }
}

/// A registered content type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentType {
    pub id: ContentTypeId,
    pub app_label: String,
    pub model: String,
}

impl ContentType {
    /// The natural key of this content type.
    pub fn key(&self) -> ContentTypeKey {
        ContentTypeKey::new(self.app_label.clone(), self.model.clone())
    }
}

/// Handle to one target object instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub content_type: ContentTypeKey,
    pub object_id: ObjectId,
}

impl ObjectRef {
    pub fn new(
        app_label: impl Into<String>,
        model: impl Into<String>,
        object_id: impl Into<ObjectId>,
    ) -> Self {
        Self {
            content_type: ContentTypeKey::new(app_label, model),
            object_id: object_id.into(),
        }
    }

    pub fn app_label(&self) -> &str {
        &self.content_type.app_label
    }

    pub fn model(&self) -> &str {
        &self.content_type.model
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.content_type, self.object_id)
    }
}

/// Anything that can be the target of an object-scoped grant.
pub trait AsObject {
    fn object_ref(&self) -> ObjectRef;
}

impl AsObject for ObjectRef {
    fn object_ref(&self) -> ObjectRef {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        let obj = ObjectRef::new("auth", "group", 3);
        assert_eq!(obj.to_string(), "auth.group(3)");
        assert_eq!(obj.app_label(), "auth");
        assert_eq!(obj.model(), "group");
    }

    #[test]
    fn test_objects_of_different_types_differ() {
        let group = ObjectRef::new("auth", "group", 1);
        let role = ObjectRef::new("permissify", "role", 1);
        assert_ne!(group, role);
    }
}
