//! Merging patch trees into generated objects.
//!
//! Workshop templates may carry a partial pod template (`session.patches`) that
//! is merged into the generated workshop Deployment. The merge algorithm itself
//! lives in [`overlay`]; this module finds the part of the target a patch
//! applies to.
//!
//! The pod template is reached with [`pod_spec_mut`].

pub mod overlay;

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Keys leading from a Deployment to its pod template spec.
const POD_SPEC_KEYS: [&str; 3] = ["spec", "template", "spec"];

/// The `spec.template.spec` mapping of a Deployment body.
///
/// Missing levels are created as empty mappings. Fails if a level exists but
/// is not a mapping.
pub fn pod_spec_mut(deployment: &mut Value) -> Result<&mut Value> {
    let mut current = deployment;
    for key in POD_SPEC_KEYS {
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        current = match current {
            Value::Mapping(map) => map
                .entry(Value::String(key.to_string()))
                .or_insert(Value::Null),
            other => {
                return Err(Error::InvalidObject {
                    message: format!(
                        "expected a mapping above '{}' in the pod template, found {}",
                        key,
                        type_name(other)
                    ),
                })
            }
        };
    }
    if current.is_null() {
        *current = Value::Mapping(Mapping::new());
    }
    if current.is_mapping() {
        Ok(current)
    } else {
        Err(Error::InvalidObject {
            message: format!(
                "expected spec.template.spec to be a mapping, found {}",
                type_name(current)
            ),
        })
    }
}

/// Short name of a value's type for log and error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}
