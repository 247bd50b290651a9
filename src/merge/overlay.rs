//! Smart overlay merge.
//!
//! Deep-merges a patch tree into a target tree in place:
//!
//! - Mapping into mapping: merge key by key, recursing where both sides hold a
//!   value.
//! - Sequence into sequence: each patch element that is a mapping with a
//!   `name` merges into the target element carrying the same `name`, or is
//!   appended when there is none. Elements without a `name` are appended.
//! - Anything else: the patch value replaces the target.
//!
//! Name matching lets a template change one container's image, or add an
//! environment variable, without restating the rest of the list.

use log::{debug, warn};
use serde_yaml::Value;

use super::type_name;

/// Merges `patch` into `target`.
pub fn overlay_merge(target: &mut Value, patch: &Value) {
    merge_at(target, patch, "");
}

fn merge_at(target: &mut Value, patch: &Value, path: &str) {
    match (target, patch) {
        (Value::Mapping(target_map), Value::Mapping(patch_map)) => {
            for (key, value) in patch_map {
                let child_path = join_path(path, key);
                match target_map.get_mut(key) {
                    Some(existing) => merge_at(existing, value, &child_path),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Sequence(target_seq), Value::Sequence(patch_seq)) => {
            for item in patch_seq {
                let matched = element_name(item).and_then(|name| {
                    target_seq
                        .iter_mut()
                        .find(|existing| element_name(existing) == Some(name))
                });
                match matched {
                    Some(existing) => {
                        let item_path = match element_name(item) {
                            Some(name) => format!("{}[name={}]", path, scalar_text(name)),
                            None => path.to_string(),
                        };
                        merge_at(existing, item, &item_path);
                    }
                    None => {
                        debug!("appending element to '{}'", display_path(path));
                        target_seq.push(item.clone());
                    }
                }
            }
        }
        (target, patch) => {
            if !target.is_null() && std::mem::discriminant(target) != std::mem::discriminant(patch)
            {
                warn!(
                    "Type mismatch at path '{}': replacing {} with {}",
                    display_path(path),
                    type_name(target),
                    type_name(patch)
                );
            }
            *target = patch.clone();
        }
    }
}

/// The scalar `name` field of a sequence element, if it is a mapping that has
/// one. Names of any scalar type match by equality.
fn element_name(item: &Value) -> Option<&Value> {
    item.as_mapping()
        .and_then(|map| map.get("name"))
        .filter(|name| matches!(name, Value::String(_) | Value::Number(_) | Value::Bool(_)))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}

fn join_path(path: &str, key: &Value) -> String {
    let key = scalar_text(key);
    if path.is_empty() {
        key
    } else {
        format!("{}.{}", path, key)
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "."
    } else {
        path
    }
}
