//! # Cluster API
//!
//! The provisioner never talks HTTP itself. Every read and write goes through
//! the [`ClusterApi`] trait, which separates the provisioning logic from the
//! transport that reaches a real cluster.
//!
//! Two implementations are provided:
//!
//! - **[`kubernetes::KubeCluster`]**: a real cluster, reached with the `kube` crate
//!   using in-cluster configuration or the local kubeconfig.
//! - **[`memory::MemoryCluster`]**: an in-process object store. It assigns
//!   uids, reports name conflicts, garbage-collects owned objects on delete,
//!   and can be told to fail in specific ways. Tests use it to exercise the
//!   provisioner without a cluster.
//!
//! All calls are blocking and are made strictly one after another.

pub mod kubernetes;
pub mod memory;

use std::collections::HashSet;

use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::object::{self, ResourceKey};

/// A resource type the cluster serves, as returned by [`ClusterApi::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    /// API group, empty for the core group.
    pub group: String,
    pub version: String,
    /// `group/version`, or just `version` for the core group.
    pub api_version: String,
    pub kind: String,
    /// Lower-case plural used in URLs.
    pub plural: String,
    /// Whether instances live inside a namespace.
    pub namespaced: bool,
}

impl ResourceType {
    pub fn new(api_version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        let (group, version) = split_api_version(api_version);
        Self {
            group: group.to_string(),
            version: version.to_string(),
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            namespaced,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.api_version, &self.kind)
    }

    /// The namespace a call should be scoped to: `None` for cluster-scoped
    /// types whatever the caller passed.
    pub fn scope<'a>(&self, namespace: Option<&'a str>) -> Option<&'a str> {
        if self.namespaced {
            namespace
        } else {
            None
        }
    }
}

/// Splits `group/version` into its parts; the core group has no slash.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Works out which namespace a create should land in.
///
/// An explicit `namespace` wins over the body's `metadata.namespace`. A
/// namespaced type with neither is rejected; cluster-scoped types always get
/// `None`.
pub fn create_namespace(
    resource: &ResourceType,
    namespace: Option<&str>,
    body: &Value,
) -> Result<Option<String>> {
    if !resource.namespaced {
        return Ok(None);
    }
    namespace
        .or_else(|| object::namespace(body))
        .map(|ns| Some(ns.to_string()))
        .ok_or_else(|| Error::InvalidObject {
            message: format!("{} needs a namespace", object::describe(body)),
        })
}

/// Operations the provisioner needs from a cluster.
///
/// Implementations map "not found" to [`crate::error::Error::NotFound`] (or
/// `ResourceTypeNotFound` from `resolve`), name collisions to
/// [`crate::error::Error::AlreadyExists`], and everything else to
/// [`crate::error::Error::Transport`].
pub trait ClusterApi: Send + Sync {
    /// Looks up the resource type serving `(apiVersion, kind)`.
    fn resolve(&self, api_version: &str, kind: &str) -> Result<ResourceType>;

    /// Fetches one named instance.
    fn get(&self, resource: &ResourceType, namespace: Option<&str>, name: &str) -> Result<Value>;

    /// Lists instances, across all namespaces when `namespace` is `None`.
    fn list(&self, resource: &ResourceType, namespace: Option<&str>) -> Result<Vec<Value>>;

    /// Creates an instance and returns it as stored, including its uid.
    fn create(&self, resource: &ResourceType, namespace: Option<&str>, body: &Value)
        -> Result<Value>;

    /// Deletes a named instance. Dependents are collected by the cluster.
    fn delete(&self, resource: &ResourceType, namespace: Option<&str>, name: &str) -> Result<()>;

    /// Applies a JSON merge patch to a named instance.
    fn patch(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        name: &str,
        body: &Value,
    ) -> Result<Value>;

    /// Every `(apiVersion, kind)` that is namespace-scoped.
    ///
    /// Best effort: a group whose introspection fails is logged and left
    /// out rather than failing the call.
    fn namespaced_kinds(&self) -> Result<HashSet<ResourceKey>>;
}
