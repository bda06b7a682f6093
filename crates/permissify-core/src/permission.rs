//! Catalog permissions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::object::{ContentType, ContentTypeKey};
use crate::types::PermissionId;

/// Actions registered for every model by default.
pub const DEFAULT_ACTIONS: [&str; 4] = ["add", "change", "delete", "view"];

/// A permission as registered in the catalog.
///
/// Identity is `(app_label, codename, model)`; the canonical string form
/// is `"{app_label}.{codename}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    /// The content type owning this permission.
    pub content_type: ContentType,
    /// Action codename, e.g. `"change_group"`.
    pub codename: String,
    /// Human readable name, e.g. `"Can change group"`.
    pub name: String,
}

impl Permission {
    pub fn app_label(&self) -> &str {
        &self.content_type.app_label
    }

    pub fn model(&self) -> &str {
        &self.content_type.model
    }

    /// Canonical `"app_label.codename"` form.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.content_type.app_label, self.codename)
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            codename: self.codename.clone(),
            app_label: self.content_type.app_label.clone(),
            model: self.content_type.model.clone(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.content_type.app_label, self.codename)
    }
}

/// Structured `(codename, app_label, model)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub codename: String,
    pub app_label: String,
    pub model: String,
}

impl NaturalKey {
    pub fn new(
        codename: impl Into<String>,
        app_label: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            codename: codename.into(),
            app_label: app_label.into(),
            model: model.into(),
        }
    }

    pub fn content_type(&self) -> ContentTypeKey {
        ContentTypeKey::new(self.app_label.clone(), self.model.clone())
    }

    /// Canonical `"app_label.codename"` form.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.app_label, self.codename)
    }
}

/// Codename for a model action: standard actions are suffixed with the
/// model name, custom actions are used verbatim.
pub fn action_codename(action: &str, model: &str) -> String {
    if DEFAULT_ACTIONS.contains(&action) {
        format!("{}_{}", action, model)
    } else {
        action.to_string()
    }
}

/// Default human readable name for a codename.
pub fn default_name(codename: &str) -> String {
    format!("Can {}", codename.replace('_', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentTypeId;

    fn change_group() -> Permission {
        Permission {
            id: PermissionId(1),
            content_type: ContentType {
                id: ContentTypeId(2),
                app_label: "auth".into(),
                model: "group".into(),
            },
            codename: "change_group".into(),
            name: "Can change group".into(),
        }
    }

    #[test]
    fn test_full_name() {
        let perm = change_group();
        assert_eq!(perm.full_name(), "auth.change_group");
        assert_eq!(perm.to_string(), perm.full_name());
        assert_eq!(perm.natural_key().full_name(), "auth.change_group");
    }

    #[test]
    fn test_action_codename() {
        assert_eq!(action_codename("view", "role"), "view_role");
        assert_eq!(action_codename("publish", "article"), "publish");
    }

    #[test]
    fn test_default_name() {
        assert_eq!(default_name("change_group"), "Can change group");
    }

    #[test]
    fn test_permission_serializes_with_content_type() {
        let json = serde_json::to_value(change_group()).unwrap();
        assert_eq!(json["codename"], "change_group");
        assert_eq!(json["content_type"]["app_label"], "auth");
        assert_eq!(json["id"], 1);
    }
}
