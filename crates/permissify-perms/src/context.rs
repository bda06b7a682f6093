//! Request-scoped memoization of resolved permission sets.

use std::collections::{HashMap, HashSet};

use permissify_core::{GranteeKind, ObjectRef, UserId};

/// Where a permission set applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Object(ObjectRef),
}

impl From<Option<&ObjectRef>> for Scope {
    fn from(object: Option<&ObjectRef>) -> Self {
        match object {
            Some(object) => Scope::Object(object.clone()),
            None => Scope::Global,
        }
    }
}

/// Cache key: one principal, one grant source (or all), one scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub principal: UserId,
    /// `None` for the union of every source.
    pub source: Option<GranteeKind>,
    pub scope: Scope,
}

impl CacheKey {
    pub fn new(principal: UserId, source: Option<GranteeKind>, object: Option<&ObjectRef>) -> Self {
        Self {
            principal,
            source,
            scope: Scope::from(object),
        }
    }
}

/// Memoized permission sets for the lifetime of one request.
///
/// Owned by the caller and dropped with it. Nothing here is shared across
/// requests.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    entries: HashMap<CacheKey, HashSet<String>>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&HashSet<String>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, permissions: HashSet<String>) {
        self.entries.insert(key, permissions);
    }

    /// Drop every entry for one principal. Returns how many were dropped.
    pub fn invalidate(&mut self, principal: UserId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.principal != principal);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_only_touches_principal() {
        let mut ctx = ResolutionContext::new();
        let object = ObjectRef::new("auth", "group", 1);

        ctx.insert(CacheKey::new(UserId(1), None, None), HashSet::new());
        ctx.insert(
            CacheKey::new(UserId(1), Some(GranteeKind::Group), Some(&object)),
            HashSet::new(),
        );
        ctx.insert(CacheKey::new(UserId(2), None, None), HashSet::new());

        assert_eq!(ctx.invalidate(UserId(1)), 2);
        assert_eq!(ctx.len(), 1);
        assert!(ctx.get(&CacheKey::new(UserId(2), None, None)).is_some());

        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_scopes_are_distinct() {
        let mut ctx = ResolutionContext::new();
        let one = ObjectRef::new("auth", "group", 1);
        let two = ObjectRef::new("auth", "group", 2);

        ctx.insert(
            CacheKey::new(UserId(1), None, Some(&one)),
            HashSet::from(["auth.change_group".to_string()]),
        );
        assert!(ctx.get(&CacheKey::new(UserId(1), None, Some(&two))).is_none());
        assert!(ctx.get(&CacheKey::new(UserId(1), None, None)).is_none());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn key() -> impl Strategy<Value = CacheKey> {
            (
                1i64..5,
                proptest::option::of(prop_oneof![
                    Just(GranteeKind::User),
                    Just(GranteeKind::Group),
                    Just(GranteeKind::Role),
                ]),
                proptest::option::of(1i64..4),
            )
                .prop_map(|(principal, source, object_id)| {
                    let object = object_id.map(|id| ObjectRef::new("auth", "group", id));
                    CacheKey::new(UserId(principal), source, object.as_ref())
                })
        }

        proptest! {
            #[test]
            fn test_invalidate_leaves_other_principals(
                keys in proptest::collection::vec(key(), 0..32),
                target in 1i64..5,
            ) {
                let mut ctx = ResolutionContext::new();
                for key in &keys {
                    ctx.insert(key.clone(), HashSet::new());
                }
                let before = ctx.len();

                let dropped = ctx.invalidate(UserId(target));
                prop_assert_eq!(before - dropped, ctx.len());
                for key in &keys {
                    prop_assert_eq!(ctx.get(key).is_some(), key.principal != UserId(target));
                }
            }
        }
    }
}
