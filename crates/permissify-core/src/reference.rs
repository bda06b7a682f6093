//! Permission references and bulk specifiers.
//!
//! Callers name permissions in several ways:
//!
//! | Form | Example | Meaning |
//! |------|---------|---------|
//! | canonical name | `"auth.change_group"` | `app_label.codename` |
//! | bare action | `"view"` | needs a target object; `view_{model}` |
//! | natural key | `("change_group", "auth", "group")` | exact catalog key |
//! | resolved | `Permission` | passed through |
//!
//! Grant and revoke additionally accept bulk specifiers that expand to many
//! permissions:
//!
//! | Specifier | Expands to |
//! |-----------|------------|
//! | `"__all__"`, `"*"` (with object) | every permission of the object's model |
//! | `"auth.*"`, `"auth.__all__"` | every permission of the app |
//! | `"auth.*_group"` | every permission of `auth.group`, as registered at grant time |
//! | `"a.b, c.d"` | each fragment independently |
//! | `List(..)` | each element independently |

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::grant::ObjectGrant;
use crate::object::{ContentTypeKey, ObjectRef};
use crate::permission::{action_codename, NaturalKey, Permission};

/// Wildcard naming every permission of an object's model.
pub const ALL: &str = "__all__";

/// Short wildcard, only meaningful with a target object.
pub const STAR: &str = "*";

static APP_WILDCARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<app_label>\w+)\.(?:\*|__all__)$").expect("valid regex"));

static MODEL_WILDCARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<app_label>\w+)\.\*_(?P<model>\w+)$").expect("valid regex"));

/// A reference to one or more permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionRef {
    /// A canonical name, bare action or bulk specifier string.
    Name(String),
    /// A `(codename, app_label, model)` triple.
    NaturalKey(NaturalKey),
    /// An already resolved catalog permission.
    Resolved(Permission),
    /// An existing object grant, standing for its permission.
    Grant(Box<ObjectGrant>),
    /// Several references, each applied independently.
    List(Vec<PermissionRef>),
}

impl PermissionRef {
    /// Short description of the form, for error messages.
    pub fn form(&self) -> &'static str {
        match self {
            PermissionRef::Name(_) => "name",
            PermissionRef::NaturalKey(_) => "natural key",
            PermissionRef::Resolved(_) => "permission",
            PermissionRef::Grant(_) => "object grant",
            PermissionRef::List(_) => "list",
        }
    }

    /// Canonical `"app_label.codename"` string for a single reference,
    /// without consulting the catalog.
    ///
    /// Bare actions need `object` to supply the model.
    pub fn canonical_name(&self, object: Option<&ObjectRef>) -> Result<String> {
        match self {
            PermissionRef::Name(name) if name.contains('.') => {
                parse_permission_name(name)?;
                Ok(name.clone())
            }
            PermissionRef::Name(action) => {
                let key = bare_action_key(action, object)?;
                Ok(key.full_name())
            }
            PermissionRef::NaturalKey(key) => Ok(key.full_name()),
            PermissionRef::Resolved(permission) => Ok(permission.full_name()),
            other => Err(CoreError::InvalidPermissionType(format!(
                "expected a single permission, got {}",
                other.form()
            ))),
        }
    }
}

impl From<&str> for PermissionRef {
    fn from(name: &str) -> Self {
        PermissionRef::Name(name.to_string())
    }
}

impl From<String> for PermissionRef {
    fn from(name: String) -> Self {
        PermissionRef::Name(name)
    }
}

impl From<&String> for PermissionRef {
    fn from(name: &String) -> Self {
        PermissionRef::Name(name.clone())
    }
}

impl From<NaturalKey> for PermissionRef {
    fn from(key: NaturalKey) -> Self {
        PermissionRef::NaturalKey(key)
    }
}

impl From<(&str, &str, &str)> for PermissionRef {
    fn from((codename, app_label, model): (&str, &str, &str)) -> Self {
        PermissionRef::NaturalKey(NaturalKey::new(codename, app_label, model))
    }
}

impl From<Permission> for PermissionRef {
    fn from(permission: Permission) -> Self {
        PermissionRef::Resolved(permission)
    }
}

impl From<&Permission> for PermissionRef {
    fn from(permission: &Permission) -> Self {
        PermissionRef::Resolved(permission.clone())
    }
}

impl From<ObjectGrant> for PermissionRef {
    fn from(grant: ObjectGrant) -> Self {
        PermissionRef::Grant(Box::new(grant))
    }
}

impl<T: Into<PermissionRef>> From<Vec<T>> for PermissionRef {
    fn from(refs: Vec<T>) -> Self {
        PermissionRef::List(refs.into_iter().map(Into::into).collect())
    }
}

/// Split a canonical `"app_label.codename"` name.
pub fn parse_permission_name(name: &str) -> Result<(&str, &str)> {
    let mut parts = name.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(app_label), Some(codename), None) if !app_label.is_empty() && !codename.is_empty() => {
            Ok((app_label, codename))
        }
        _ => Err(CoreError::InvalidPermissionReference(format!(
            "permission name should be in the form app_label.codename, got {:?}",
            name
        ))),
    }
}

/// Natural key of a bare action against a target object.
pub fn bare_action_key(action: &str, object: Option<&ObjectRef>) -> Result<NaturalKey> {
    let object = object.ok_or_else(|| {
        CoreError::InvalidPermissionReference(format!(
            "bare permission {:?} requires a target object",
            action
        ))
    })?;
    if action.is_empty() {
        return Err(CoreError::InvalidPermissionReference(
            "empty permission action".into(),
        ));
    }
    Ok(NaturalKey::new(
        action_codename(action, object.model()),
        object.app_label(),
        object.model(),
    ))
}

/// How a permission name string expands for grant and revoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// Every permission of the target object's model.
    AllForObject,
    /// Every permission under an app label.
    AllInApp { app_label: String },
    /// Every permission of one model.
    AllForModel(ContentTypeKey),
    /// Comma separated fragments, each handled independently.
    Fragments(Vec<String>),
    /// Not a bulk specifier.
    Single,
}

impl Specifier {
    /// Classify a permission name.
    pub fn parse(name: &str, has_object: bool) -> Result<Self> {
        if name == ALL || (name == STAR && has_object) {
            if !has_object {
                return Err(CoreError::InvalidPermissionReference(format!(
                    "{:?} requires a target object",
                    name
                )));
            }
            return Ok(Specifier::AllForObject);
        }

        if let Some(caps) = APP_WILDCARD.captures(name) {
            return Ok(Specifier::AllInApp {
                app_label: caps["app_label"].to_string(),
            });
        }

        if let Some(caps) = MODEL_WILDCARD.captures(name) {
            return Ok(Specifier::AllForModel(ContentTypeKey::new(
                &caps["app_label"],
                &caps["model"],
            )));
        }

        if name.contains(',') {
            return Ok(Specifier::Fragments(
                name.split(',').map(|part| part.trim().to_string()).collect(),
            ));
        }

        Ok(Specifier::Single)
    }
}
