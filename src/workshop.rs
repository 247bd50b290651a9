//! # Workshops
//!
//! A Workshop is the template sessions are created from. It is a cluster
//! custom resource (`training.eduk8s.io/v1alpha1`, kind `Workshop`) whose
//! `spec` describes the workshop image and metadata, and whose
//! `spec.session` lists the extra objects to create per session and an
//! optional patch for the workshop pod. Only workshops with
//! `status.enabled: true` can be deployed.
//!
//! This module provides a typed read-only view of a stored Workshop, plus the
//! import, enable, disable, delete and list operations.

use std::path::Path;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use log::debug;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::cluster::{ClusterApi, ResourceType};
use crate::defaults::{DEFAULT_BUDGET, TRAINING_API_VERSION};
use crate::error::{Error, Result};
use crate::object;

/// Per-session part of a workshop spec.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionTemplate {
    /// Cluster role bound into the session namespace.
    pub role: Option<String>,
    /// Budget applied to the session namespace.
    pub budget: Option<String>,
    /// Objects created for every session, in order.
    pub objects: Vec<Value>,
    /// Partial pod spec merged into the workshop deployment.
    pub patches: Option<Value>,
}

/// The `spec` of a Workshop.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkshopSpec {
    pub vendor: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub duration: Option<String>,
    pub timeout: Option<String>,
    /// Older workshops name their budget here instead of under `session`.
    pub budget: Option<String>,
    pub session: SessionTemplate,
}

/// A stored Workshop.
#[derive(Debug, Clone, PartialEq)]
pub struct Workshop {
    pub name: String,
    pub uid: Option<String>,
    pub namespace: Option<String>,
    pub spec: WorkshopSpec,
    pub enabled: bool,
    /// The object as the cluster returned it.
    pub body: Value,
}

impl Workshop {
    /// Builds the typed view of a stored Workshop object.
    pub fn from_object(body: Value) -> Result<Self> {
        let name = object::require_name(&body)?;
        let spec = match body.get("spec") {
            Some(spec) if !spec.is_null() => {
                serde_yaml::from_value(spec.clone()).map_err(|err| Error::InvalidObject {
                    message: format!("workshop {:?} has an invalid spec: {}", name, err),
                })?
            }
            _ => WorkshopSpec::default(),
        };
        let enabled = body
            .get("status")
            .and_then(|status| status.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self {
            uid: object::uid(&body).map(str::to_string),
            namespace: object::namespace(&body).map(str::to_string),
            name,
            spec,
            enabled,
            body,
        })
    }

    /// Role to bind, falling back to `default_role`.
    pub fn role<'a>(&'a self, default_role: &'a str) -> &'a str {
        self.spec.session.role.as_deref().unwrap_or(default_role)
    }

    /// Budget to apply: `session.budget`, then the top-level `budget`, then
    /// `default`.
    pub fn budget(&self) -> &str {
        self.spec
            .session
            .budget
            .as_deref()
            .or(self.spec.budget.as_deref())
            .unwrap_or(DEFAULT_BUDGET)
    }

    /// Namespace the workshop's own objects live in.
    pub fn workshop_namespace<'a>(&'a self, request_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(request_namespace)
    }

    pub fn image(&self) -> &str {
        self.spec.image.as_deref().unwrap_or_default()
    }

    /// Non-controller owner reference pointing at this workshop.
    pub fn owner_reference(&self) -> Result<OwnerReference> {
        object::owner_reference(&self.body, false)
    }

    /// Fails unless the workshop is enabled.
    pub fn require_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(Error::WorkshopDisabled {
                name: self.name.clone(),
            })
        }
    }
}

/// Resolves the Workshop resource type.
pub fn resource(cluster: &dyn ClusterApi) -> Result<ResourceType> {
    cluster.resolve(TRAINING_API_VERSION, "Workshop")
}

/// Fetches a workshop, reporting a missing one as `WorkshopNotFound`.
pub fn fetch(cluster: &dyn ClusterApi, name: &str, namespace: &str) -> Result<Workshop> {
    let workshops = resource(cluster)?;
    let body = cluster
        .get(&workshops, Some(namespace), name)
        .map_err(|err| workshop_error(err, name))?;
    Workshop::from_object(body)
}

/// Lists workshops, sorted by name.
pub fn list(cluster: &dyn ClusterApi, namespace: &str) -> Result<Vec<Workshop>> {
    let workshops = resource(cluster)?;
    let mut found = cluster
        .list(&workshops, Some(namespace))?
        .into_iter()
        .map(Workshop::from_object)
        .collect::<Result<Vec<_>>>()?;
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Reads a Workshop document from a YAML file.
pub fn read_document<P: AsRef<Path>>(path: P) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Creates a workshop from a document, optionally renaming it first.
///
/// Returns the name of the created workshop.
pub fn import(
    cluster: &dyn ClusterApi,
    mut body: Value,
    name: Option<&str>,
    namespace: &str,
) -> Result<String> {
    let key = object::ResourceKey::of(&body)?;
    if key.api_version != TRAINING_API_VERSION || key.kind != "Workshop" {
        return Err(Error::InvalidObject {
            message: format!(
                "expected a {}/Workshop document, found {}",
                TRAINING_API_VERSION, key
            ),
        });
    }
    if let Some(name) = name {
        object::metadata_mut(&mut body)?.insert(
            Value::String("name".to_string()),
            Value::String(name.to_string()),
        );
    }
    let workshops = resource(cluster)?;
    let created = cluster.create(&workshops, Some(namespace), &body)?;
    let name = object::require_name(&created)?;
    debug!("imported workshop {}", name);
    Ok(name)
}

/// Sets `status.enabled` with a merge patch.
pub fn set_enabled(
    cluster: &dyn ClusterApi,
    name: &str,
    namespace: &str,
    enabled: bool,
) -> Result<()> {
    let workshops = resource(cluster)?;
    let mut status = Mapping::new();
    status.insert(Value::String("enabled".to_string()), Value::Bool(enabled));
    let mut patch = Mapping::new();
    patch.insert(Value::String("status".to_string()), Value::Mapping(status));
    cluster
        .patch(&workshops, Some(namespace), name, &Value::Mapping(patch))
        .map_err(|err| workshop_error(err, name))?;
    Ok(())
}

/// Deletes a workshop. Its sessions go with it.
pub fn delete(cluster: &dyn ClusterApi, name: &str, namespace: &str) -> Result<()> {
    let workshops = resource(cluster)?;
    cluster
        .delete(&workshops, Some(namespace), name)
        .map_err(|err| workshop_error(err, name))
}

fn workshop_error(err: Error, name: &str) -> Error {
    match err {
        Error::NotFound { .. } => Error::WorkshopNotFound {
            name: name.to_string(),
        },
        other => other,
    }
}
