//! Property-based tests for variable substitution and the overlay merge.
//!
//! These tests use proptest to generate random object trees and verify that
//! invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::merge::overlay::overlay_merge;
    use crate::substitute::{substitute, substitute_str, Bindings};
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value};

    /// Arbitrary trees of strings, numbers, booleans, sequences and mappings.
    fn tree_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9 ./-]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|entries| {
                    let mut map = Mapping::new();
                    for (key, value) in entries {
                        map.insert(Value::String(key), value);
                    }
                    Value::Mapping(map)
                }),
            ]
        })
    }

    fn session_bindings() -> Bindings {
        Bindings::new()
            .with("user_id", "b4c9z")
            .with("session_name", "lab-b4c9z")
            .with("session_namespace", "lab-b4c9z")
    }

    // ============================================================================
    // substitution property tests
    // ============================================================================

    proptest! {
        /// Property: a tree without tokens comes back unchanged
        #[test]
        fn substitute_is_identity_without_tokens(tree in tree_strategy()) {
            prop_assert_eq!(substitute(&tree, &session_bindings()), tree);
        }

        /// Property: substituting twice gives the same result as once
        #[test]
        fn substitute_is_idempotent(tree in tree_strategy()) {
            let bindings = session_bindings();
            let once = substitute(&tree, &bindings);
            let twice = substitute(&once, &bindings);
            prop_assert_eq!(once, twice);
        }

        /// Property: every occurrence of a bound token is replaced
        #[test]
        fn substitute_replaces_every_bound_token(
            prefix in "[a-z/]{0,8}",
            middle in "[a-z/]{0,8}",
            suffix in "[a-z/]{0,8}",
        ) {
            let text = format!("{}$(user_id){}$(user_id){}", prefix, middle, suffix);
            let result = substitute_str(&text, &session_bindings());
            prop_assert!(!result.contains("$(user_id)"));
            prop_assert_eq!(result, format!("{}b4c9z{}b4c9z{}", prefix, middle, suffix));
        }

        /// Property: unbound tokens survive untouched
        #[test]
        fn substitute_leaves_unbound_tokens(name in "[a-z]{1,8}_unbound") {
            let text = format!("$({})", name);
            prop_assert_eq!(substitute_str(&text, &session_bindings()), text);
        }
    }

    // ============================================================================
    // overlay merge property tests
    // ============================================================================

    proptest! {
        /// Property: merging an empty mapping leaves a mapping target unchanged
        #[test]
        fn overlay_with_empty_patch_is_identity(tree in tree_strategy()) {
            prop_assume!(tree.is_mapping());
            let mut target = tree.clone();
            overlay_merge(&mut target, &Value::Mapping(Mapping::new()));
            prop_assert_eq!(target, tree);
        }

        /// Property: a scalar patch always replaces the target
        #[test]
        fn overlay_scalar_patch_replaces(tree in tree_strategy(), scalar in "[a-z]{1,8}") {
            let mut target = tree;
            let patch = Value::String(scalar);
            overlay_merge(&mut target, &patch);
            prop_assert_eq!(target, patch);
        }

        /// Property: every key of a mapping patch is present after the merge
        #[test]
        fn overlay_keeps_patch_keys(
            base in prop::collection::btree_map("[a-z]{1,4}", "[a-z]{0,4}", 0..5),
            patch in prop::collection::btree_map("[a-z]{1,4}", "[a-z]{0,4}", 0..5),
        ) {
            let to_value = |entries: &std::collections::BTreeMap<String, String>| {
                let mut map = Mapping::new();
                for (key, value) in entries {
                    map.insert(Value::from(key.as_str()), Value::from(value.as_str()));
                }
                Value::Mapping(map)
            };
            let mut target = to_value(&base);
            overlay_merge(&mut target, &to_value(&patch));
            for (key, value) in &patch {
                prop_assert_eq!(&target[key.as_str()], &Value::from(value.as_str()));
            }
            for (key, value) in &base {
                if !patch.contains_key(key) {
                    prop_assert_eq!(&target[key.as_str()], &Value::from(value.as_str()));
                }
            }
        }

        /// Property: sequence elements without a name are always appended
        #[test]
        fn overlay_appends_unnamed_elements(
            base in prop::collection::vec("[a-z]{1,4}", 0..5),
            extra in prop::collection::vec("[a-z]{1,4}", 0..5),
        ) {
            let seq = |items: &[String]| {
                Value::Sequence(items.iter().map(|s| Value::from(s.as_str())).collect())
            };
            let mut target = seq(&base);
            overlay_merge(&mut target, &seq(&extra));
            let merged = target.as_sequence().map(Vec::len).unwrap_or_default();
            prop_assert_eq!(merged, base.len() + extra.len());
        }
    }
}
