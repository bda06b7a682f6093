//! Proptest generators for property-based testing.

use proptest::prelude::*;

use permissify_core::{GranteeKind, ObjectRef, DEFAULT_ACTIONS};

/// Generate a grantee kind.
pub fn grantee_kind() -> impl Strategy<Value = GranteeKind> {
    prop_oneof![
        Just(GranteeKind::User),
        Just(GranteeKind::Group),
        Just(GranteeKind::Role),
    ]
}

/// Generate one of the default actions.
pub fn action() -> impl Strategy<Value = &'static str> {
    prop::sample::select(DEFAULT_ACTIONS.to_vec())
}

/// Generate a model from the default catalog.
pub fn model() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop::sample::select(vec![
        ("auth", "user"),
        ("auth", "group"),
        ("auth", "permission"),
        ("permissify", "role"),
    ])
}

/// One grant against the default catalog.
#[derive(Debug, Clone)]
pub struct GrantCase {
    pub grantee: GranteeKind,
    pub app_label: &'static str,
    pub model: &'static str,
    pub action: &'static str,
    /// Object id for an object-scoped grant, `None` for a global one.
    pub object_id: Option<i64>,
}

impl GrantCase {
    /// Canonical name of the granted permission.
    pub fn permission_name(&self) -> String {
        format!("{}.{}_{}", self.app_label, self.action, self.model)
    }

    /// Target object, typed by the permission's model.
    pub fn object(&self) -> Option<ObjectRef> {
        self.object_id
            .map(|id| ObjectRef::new(self.app_label, self.model, id))
    }
}

impl Arbitrary for GrantCase {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            grantee_kind(),
            model(),
            action(),
            proptest::option::of(1i64..=1000i64),
        )
            .prop_map(|(grantee, (app_label, model), action, object_id)| GrantCase {
                grantee,
                app_label,
                model,
                action,
                object_id,
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permissify_core::PermissionRef;

    proptest! {
        #[test]
        fn test_case_names_are_canonical(case: GrantCase) {
            let name = case.permission_name();
            let canonical = PermissionRef::from(name.as_str())
                .canonical_name(None)
                .unwrap();
            prop_assert_eq!(canonical, name);
        }

        #[test]
        fn test_bare_action_matches_case_name(case: GrantCase) {
            let object = ObjectRef::new(case.app_label, case.model, 1);
            let from_action = PermissionRef::from(case.action)
                .canonical_name(Some(&object))
                .unwrap();
            prop_assert_eq!(from_action, case.permission_name());
        }
    }
}
