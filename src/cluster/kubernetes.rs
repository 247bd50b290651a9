//! Cluster backend that talks to a real API server through the `kube` crate.
//!
//! The `kube` client is asynchronous; this backend owns a current-thread
//! tokio runtime and blocks on each call, so the rest of the crate stays
//! synchronous and every request completes before the next one starts.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use ::kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use ::kube::core::{ApiResource, GroupVersionKind};
use ::kube::discovery::{self, Scope};
use ::kube::Client;
use log::{debug, warn};
use serde_yaml::Value;
use tokio::runtime::Runtime;

use super::{create_namespace, ClusterApi, ResourceType};
use crate::error::{Error, Result};
use crate::object::{self, ResourceKey};

/// A live cluster reached with in-cluster configuration or the local
/// kubeconfig.
pub struct KubeCluster {
    runtime: Runtime,
    client: Client,
    resolved: Mutex<HashMap<ResourceKey, ResourceType>>,
}

impl KubeCluster {
    /// Connects using the same lookup rules as `kubectl`.
    pub fn connect() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = runtime
            .block_on(Client::try_default())
            .map_err(transport)?;
        Ok(Self {
            runtime,
            client,
            resolved: Mutex::new(HashMap::new()),
        })
    }

    fn api(&self, resource: &ResourceType, namespace: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
        let api_resource = ApiResource::from_gvk_with_plural(&gvk, &resource.plural);
        match resource.scope(namespace) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        }
    }

    /// Namespaced kinds served by one group version.
    fn namespaced_kinds_in(&self, group_version: &str) -> std::result::Result<Vec<ResourceKey>, ::kube::Error> {
        let list = if group_version.contains('/') {
            self.runtime
                .block_on(self.client.list_api_group_resources(group_version))?
        } else {
            self.runtime
                .block_on(self.client.list_core_api_resources(group_version))?
        };
        Ok(list
            .resources
            .into_iter()
            .filter(|r| r.namespaced && !r.name.contains('/'))
            .map(|r| ResourceKey::new(group_version, r.kind))
            .collect())
    }

    fn group_versions(&self) -> Result<Vec<String>> {
        let core = self
            .runtime
            .block_on(self.client.list_core_api_versions())
            .map_err(transport)?;
        let groups = self
            .runtime
            .block_on(self.client.list_api_groups())
            .map_err(transport)?;

        let mut versions = core.versions;
        for group in groups.groups {
            versions.extend(group.versions.into_iter().map(|v| v.group_version));
        }
        Ok(versions)
    }
}

impl ClusterApi for KubeCluster {
    fn resolve(&self, api_version: &str, kind: &str) -> Result<ResourceType> {
        let key = ResourceKey::new(api_version, kind);
        let mut resolved = self
            .resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(resource) = resolved.get(&key) {
            return Ok(resource.clone());
        }

        let (group, version) = super::split_api_version(api_version);
        let gvk = GroupVersionKind::gvk(group, version, kind);
        let (api_resource, capabilities) = self
            .runtime
            .block_on(discovery::pinned_kind(&self.client, &gvk))
            .map_err(|err| match err {
                ::kube::Error::Discovery(_) => missing_type(api_version, kind),
                ::kube::Error::Api(ref response) if response.code == 404 => {
                    missing_type(api_version, kind)
                }
                other => transport(other),
            })?;

        let resource = ResourceType::new(
            api_version,
            &api_resource.kind,
            &api_resource.plural,
            matches!(capabilities.scope, Scope::Namespaced),
        );
        debug!("resolved {} as {}", key, resource.plural);
        resolved.insert(key, resource.clone());
        Ok(resource)
    }

    fn get(&self, resource: &ResourceType, namespace: Option<&str>, name: &str) -> Result<Value> {
        let api = self.api(resource, namespace);
        let found = self
            .runtime
            .block_on(api.get(name))
            .map_err(|err| classify(err, resource, resource.scope(namespace), name))?;
        from_dynamic(&found)
    }

    fn list(&self, resource: &ResourceType, namespace: Option<&str>) -> Result<Vec<Value>> {
        let api = self.api(resource, namespace);
        let list = self
            .runtime
            .block_on(api.list(&ListParams::default()))
            .map_err(transport)?;
        list.items.iter().map(from_dynamic).collect()
    }

    fn create(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        body: &Value,
    ) -> Result<Value> {
        let namespace = create_namespace(resource, namespace, body)?;
        let name = object::require_name(body)?;
        let api = self.api(resource, namespace.as_deref());
        let created = self
            .runtime
            .block_on(api.create(&PostParams::default(), &to_dynamic(body)?))
            .map_err(|err| classify(err, resource, namespace.as_deref(), &name))?;
        from_dynamic(&created)
    }

    fn delete(&self, resource: &ResourceType, namespace: Option<&str>, name: &str) -> Result<()> {
        let api = self.api(resource, namespace);
        self.runtime
            .block_on(api.delete(name, &DeleteParams::background()))
            .map_err(|err| classify(err, resource, resource.scope(namespace), name))?;
        Ok(())
    }

    fn patch(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        name: &str,
        body: &Value,
    ) -> Result<Value> {
        let api = self.api(resource, namespace);
        let patch = Patch::Merge(serde_json::to_value(body)?);
        let patched = self
            .runtime
            .block_on(api.patch(name, &PatchParams::default(), &patch))
            .map_err(|err| classify(err, resource, resource.scope(namespace), name))?;
        from_dynamic(&patched)
    }

    fn namespaced_kinds(&self) -> Result<HashSet<ResourceKey>> {
        let mut kinds = HashSet::new();
        for group_version in self.group_versions()? {
            match self.namespaced_kinds_in(&group_version) {
                Ok(found) => kinds.extend(found),
                Err(err) => warn!(
                    "Skipping {} while discovering namespaced kinds: {}",
                    group_version, err
                ),
            }
        }
        Ok(kinds)
    }
}

fn to_dynamic(body: &Value) -> Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(body)?)?)
}

fn from_dynamic(found: &DynamicObject) -> Result<Value> {
    Ok(serde_yaml::to_value(serde_json::to_value(found)?)?)
}

fn missing_type(api_version: &str, kind: &str) -> Error {
    Error::ResourceTypeNotFound {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
    }
}

fn transport(err: ::kube::Error) -> Error {
    Error::Transport {
        message: err.to_string(),
    }
}

/// Maps API status codes onto the crate's error taxonomy.
fn classify(
    err: ::kube::Error,
    resource: &ResourceType,
    namespace: Option<&str>,
    name: &str,
) -> Error {
    match err {
        ::kube::Error::Api(ref response) if response.code == 404 => Error::NotFound {
            kind: resource.kind.clone(),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        },
        ::kube::Error::Api(ref response) if response.code == 409 => Error::AlreadyExists {
            kind: resource.kind.clone(),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        },
        other => transport(other),
    }
}
