//! Helpers for dynamic Kubernetes object bodies.
//!
//! Workshop templates carry arbitrary objects, so the provisioner works on
//! untyped trees (`serde_yaml::Value`) rather than per-kind structs. The
//! functions here read and write the handful of well-known fields the
//! provisioner cares about: `apiVersion`, `kind`, `metadata.name`,
//! `metadata.namespace`, `metadata.uid`, annotations and owner references.

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Identifies a resource type by `(apiVersion, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
}

impl ResourceKey {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Reads the key of an object body, failing if either field is missing.
    pub fn of(obj: &Value) -> Result<Self> {
        let api_version = api_version(obj).ok_or_else(|| Error::InvalidObject {
            message: format!("object {} has no apiVersion", describe(obj)),
        })?;
        let kind = kind(obj).ok_or_else(|| Error::InvalidObject {
            message: format!("object {} has no kind", describe(obj)),
        })?;
        Ok(Self::new(api_version, kind))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Follows a chain of mapping keys and returns the string found there.
pub fn str_at<'a>(obj: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = obj;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

pub fn api_version(obj: &Value) -> Option<&str> {
    str_at(obj, &["apiVersion"])
}

pub fn kind(obj: &Value) -> Option<&str> {
    str_at(obj, &["kind"])
}

pub fn name(obj: &Value) -> Option<&str> {
    str_at(obj, &["metadata", "name"])
}

pub fn namespace(obj: &Value) -> Option<&str> {
    str_at(obj, &["metadata", "namespace"])
}

pub fn uid(obj: &Value) -> Option<&str> {
    str_at(obj, &["metadata", "uid"])
}

pub fn annotation<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    str_at(obj, &["metadata", "annotations", key])
}

/// Returns `metadata.name`, or an `InvalidObject` error naming the object.
pub fn require_name(obj: &Value) -> Result<String> {
    name(obj).map(str::to_string).ok_or_else(|| Error::InvalidObject {
        message: format!("object {} has no metadata.name", describe(obj)),
    })
}

/// Returns `metadata.uid`, or an `InvalidObject` error naming the object.
pub fn require_uid(obj: &Value) -> Result<String> {
    uid(obj).map(str::to_string).ok_or_else(|| Error::InvalidObject {
        message: format!("object {} has no metadata.uid", describe(obj)),
    })
}

/// Returns the `metadata` mapping, creating it when absent.
pub fn metadata_mut(obj: &mut Value) -> Result<&mut Mapping> {
    let description = describe(obj);
    let root = obj.as_mapping_mut().ok_or_else(|| Error::InvalidObject {
        message: format!("object {} is not a mapping", description),
    })?;
    let metadata = root
        .entry(Value::String("metadata".to_string()))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if metadata.is_null() {
        *metadata = Value::Mapping(Mapping::new());
    }
    metadata.as_mapping_mut().ok_or_else(|| Error::InvalidObject {
        message: format!("object {} has a non-mapping metadata field", description),
    })
}

pub fn set_namespace(obj: &mut Value, namespace: &str) -> Result<()> {
    metadata_mut(obj)?.insert(
        Value::String("namespace".to_string()),
        Value::String(namespace.to_string()),
    );
    Ok(())
}

/// Replaces `metadata.ownerReferences` with the given references.
pub fn set_owner_references(obj: &mut Value, owners: &[OwnerReference]) -> Result<()> {
    let owners = owners
        .iter()
        .map(serde_yaml::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    metadata_mut(obj)?.insert(
        Value::String("ownerReferences".to_string()),
        Value::Sequence(owners),
    );
    Ok(())
}

/// Uids of every owner recorded on the object.
pub fn owner_uids(obj: &Value) -> Vec<&str> {
    obj.get("metadata")
        .and_then(|meta| meta.get("ownerReferences"))
        .and_then(Value::as_sequence)
        .map(|owners| {
            owners
                .iter()
                .filter_map(|owner| owner.get("uid").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Builds an owner reference pointing at a created instance.
///
/// `controller` references also block deletion of the owner until the
/// dependent has been collected.
pub fn owner_reference(owner: &Value, controller: bool) -> Result<OwnerReference> {
    let key = ResourceKey::of(owner)?;
    Ok(OwnerReference {
        api_version: key.api_version,
        kind: key.kind,
        name: require_name(owner)?,
        uid: require_uid(owner)?,
        controller: Some(controller),
        block_owner_deletion: Some(controller),
    })
}

/// Converts a typed object (usually a `k8s-openapi` struct) to a body.
pub fn to_object<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_yaml::to_value(value)?)
}

/// Short `kind/name` description for log and error messages.
pub fn describe(obj: &Value) -> String {
    format!(
        "{}/{}",
        kind(obj).unwrap_or("<unknown kind>"),
        name(obj).unwrap_or("<unnamed>")
    )
}
