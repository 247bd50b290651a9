//! In-memory cluster for exercising the provisioner without a real API server.
//!
//! `MemoryCluster` behaves like a small, strict API server: it knows which
//! kinds are namespaced, refuses to create namespaced objects in namespaces
//! that do not exist, reports name collisions, assigns uids, and on delete
//! collects every object that is owned (directly or transitively) by the
//! deleted one, including the contents of a deleted Namespace.
//!
//! It also records every create and delete in order, and can be told to
//! report conflicts or discovery failures on demand.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use super::{create_namespace, ClusterApi, ResourceType};
use crate::defaults::TRAINING_API_VERSION;
use crate::error::{Error, Result};
use crate::object::{self, ResourceKey};

/// Storage key of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    fn new(resource: &ResourceType, namespace: Option<&str>, name: &str) -> Self {
        Self {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    fn is_namespace(&self) -> bool {
        self.api_version == "v1" && self.kind == "Namespace"
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", ns, self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    types: Vec<ResourceType>,
    objects: BTreeMap<ObjectKey, Value>,
    next_uid: u64,
    conflicts: HashMap<String, usize>,
    broken_discovery: HashSet<String>,
    created: Vec<ObjectKey>,
    deleted: Vec<ObjectKey>,
}

impl Store {
    fn find_type(&self, api_version: &str, kind: &str) -> Option<&ResourceType> {
        self.types
            .iter()
            .find(|t| t.api_version == api_version && t.kind == kind)
    }

    fn namespace_exists(&self, namespace: &str) -> bool {
        self.objects.contains_key(&ObjectKey {
            api_version: "v1".to_string(),
            kind: "Namespace".to_string(),
            namespace: None,
            name: namespace.to_string(),
        })
    }

    fn allocate_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.next_uid)
    }

    /// Removes an object and everything that depends on it.
    fn remove_cascading(&mut self, key: &ObjectKey) -> Option<Value> {
        let root = self.objects.remove(key)?;
        self.deleted.push(key.clone());

        let mut pending = vec![(key.clone(), root.clone())];
        while let Some((removed_key, removed)) = pending.pop() {
            let uid = object::uid(&removed).map(str::to_string);
            let emptied_namespace = removed_key
                .is_namespace()
                .then(|| removed_key.name.clone());

            let dependents: Vec<ObjectKey> = self
                .objects
                .iter()
                .filter(|(candidate_key, candidate)| {
                    let owned = uid
                        .as_deref()
                        .is_some_and(|uid| object::owner_uids(candidate).contains(&uid));
                    let contained = emptied_namespace.is_some()
                        && candidate_key.namespace == emptied_namespace;
                    owned || contained
                })
                .map(|(candidate_key, _)| candidate_key.clone())
                .collect();

            for dependent in dependents {
                if let Some(value) = self.objects.remove(&dependent) {
                    debug!("collected {} (dependent of {})", dependent, removed_key);
                    self.deleted.push(dependent.clone());
                    pending.push((dependent, value));
                }
            }
        }

        Some(root)
    }
}

/// An in-process object store implementing [`ClusterApi`].
#[derive(Debug)]
pub struct MemoryCluster {
    store: Mutex<Store>,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCluster {
    /// Creates a cluster serving the built-in kinds with a `default`
    /// namespace already present.
    pub fn new() -> Self {
        let cluster = Self {
            store: Mutex::new(Store::default()),
        };
        for (api_version, kind, plural, namespaced) in BUILTIN_TYPES {
            cluster.register(ResourceType::new(api_version, kind, plural, *namespaced));
        }
        let mut store = cluster.lock();
        let uid = store.allocate_uid();
        let default_namespace = namespace_body("default", &uid);
        store.objects.insert(
            ObjectKey {
                api_version: "v1".to_string(),
                kind: "Namespace".to_string(),
                namespace: None,
                name: "default".to_string(),
            },
            default_namespace,
        );
        drop(store);
        cluster
    }

    /// Makes an additional resource type available.
    pub fn register(&self, resource: ResourceType) {
        let mut store = self.lock();
        store
            .types
            .retain(|t| !(t.api_version == resource.api_version && t.kind == resource.kind));
        store.types.push(resource);
    }

    /// Stores an object directly, as if it had been created earlier.
    ///
    /// Unlike [`ClusterApi::create`] this is not recorded in [`Self::created`]
    /// and ignores injected conflicts.
    pub fn seed(&self, body: Value) -> Result<Value> {
        let key = ResourceKey::of(&body)?;
        let resource = self.resolve(&key.api_version, &key.kind)?;
        let mut store = self.lock();
        let stored = Self::store_object(&mut store, &resource, None, &body)?;
        store.created.pop();
        Ok(stored)
    }

    /// Makes the next `count` creates of `kind` fail with a name conflict.
    pub fn inject_conflicts(&self, kind: &str, count: usize) {
        *self.lock().conflicts.entry(kind.to_string()).or_default() += count;
    }

    /// Makes introspection of every kind in `api_version` fail.
    pub fn break_discovery(&self, api_version: &str) {
        self.lock().broken_discovery.insert(api_version.to_string());
    }

    /// Keys of every object created through [`ClusterApi::create`], in order.
    pub fn created(&self) -> Vec<ObjectKey> {
        self.lock().created.clone()
    }

    /// Keys of every object deleted, including collected dependents, in order.
    pub fn deleted(&self) -> Vec<ObjectKey> {
        self.lock().deleted.clone()
    }

    /// Looks up a stored object by kind, namespace and name.
    pub fn find(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<Value> {
        self.lock()
            .objects
            .iter()
            .find(|(key, _)| {
                key.kind == kind && key.namespace.as_deref() == namespace && key.name == name
            })
            .map(|(_, value)| value.clone())
    }

    /// All stored objects of a kind, optionally limited to one namespace.
    pub fn objects_of_kind(&self, kind: &str, namespace: Option<&str>) -> Vec<Value> {
        self.lock()
            .objects
            .iter()
            .filter(|(key, _)| {
                key.kind == kind && (namespace.is_none() || key.namespace.as_deref() == namespace)
            })
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_object(
        store: &mut Store,
        resource: &ResourceType,
        namespace: Option<&str>,
        body: &Value,
    ) -> Result<Value> {
        let namespace = create_namespace(resource, namespace, body)?;
        let name = object::require_name(body)?;

        if let Some(ns) = namespace.as_deref() {
            if !store.namespace_exists(ns) {
                return Err(Error::NotFound {
                    kind: "Namespace".to_string(),
                    name: ns.to_string(),
                    namespace: None,
                });
            }
        }

        let key = ObjectKey::new(resource, namespace.as_deref(), &name);
        let injected = match store.conflicts.get_mut(&resource.kind) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if injected || store.objects.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: resource.kind.clone(),
                name,
                namespace,
            });
        }

        let mut stored = body.clone();
        let uid = store.allocate_uid();
        let metadata = object::metadata_mut(&mut stored)?;
        metadata.insert(Value::String("uid".to_string()), Value::String(uid));
        match &namespace {
            Some(ns) => {
                metadata.insert(
                    Value::String("namespace".to_string()),
                    Value::String(ns.clone()),
                );
            }
            None => {
                metadata.remove("namespace");
            }
        }

        debug!("stored {}", key);
        store.created.push(key.clone());
        store.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

impl ClusterApi for MemoryCluster {
    fn resolve(&self, api_version: &str, kind: &str) -> Result<ResourceType> {
        self.lock()
            .find_type(api_version, kind)
            .cloned()
            .ok_or_else(|| Error::ResourceTypeNotFound {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            })
    }

    fn get(&self, resource: &ResourceType, namespace: Option<&str>, name: &str) -> Result<Value> {
        let namespace = resource.scope(namespace);
        let key = ObjectKey::new(resource, namespace, name);
        self.lock()
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(resource, namespace, name))
    }

    fn list(&self, resource: &ResourceType, namespace: Option<&str>) -> Result<Vec<Value>> {
        let namespace = resource.scope(namespace);
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|(key, _)| {
                key.api_version == resource.api_version
                    && key.kind == resource.kind
                    && (namespace.is_none() || key.namespace.as_deref() == namespace)
            })
            .map(|(_, value)| value.clone())
            .collect())
    }

    fn create(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        body: &Value,
    ) -> Result<Value> {
        let mut store = self.lock();
        Self::store_object(&mut store, resource, namespace, body)
    }

    fn delete(&self, resource: &ResourceType, namespace: Option<&str>, name: &str) -> Result<()> {
        let namespace = resource.scope(namespace);
        let key = ObjectKey::new(resource, namespace, name);
        self.lock()
            .remove_cascading(&key)
            .map(|_| ())
            .ok_or_else(|| not_found(resource, namespace, name))
    }

    fn patch(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        name: &str,
        body: &Value,
    ) -> Result<Value> {
        let namespace = resource.scope(namespace);
        let key = ObjectKey::new(resource, namespace, name);
        let mut store = self.lock();
        let target = store
            .objects
            .get_mut(&key)
            .ok_or_else(|| not_found(resource, namespace, name))?;
        merge_patch(target, body)?;
        Ok(target.clone())
    }

    fn namespaced_kinds(&self) -> Result<HashSet<ResourceKey>> {
        let store = self.lock();
        let mut kinds = HashSet::new();
        for resource in store.types.iter().filter(|t| t.namespaced) {
            if store.broken_discovery.contains(&resource.api_version) {
                warn!(
                    "Skipping {} while discovering namespaced kinds: discovery failed for {}",
                    resource.kind, resource.api_version
                );
                continue;
            }
            kinds.insert(resource.key());
        }
        Ok(kinds)
    }
}

/// Applies a JSON merge patch (RFC 7386): mappings merge key by key, `null`
/// removes a key, anything else replaces the target.
pub fn merge_patch(target: &mut Value, patch: &Value) -> Result<()> {
    let mut document: serde_json::Value = serde_json::to_value(&*target)?;
    let patch: serde_json::Value = serde_json::to_value(patch)?;
    json_patch::merge(&mut document, &patch);
    *target = serde_yaml::to_value(document)?;
    Ok(())
}

fn not_found(resource: &ResourceType, namespace: Option<&str>, name: &str) -> Error {
    Error::NotFound {
        kind: resource.kind.clone(),
        name: name.to_string(),
        namespace: namespace.map(str::to_string),
    }
}

fn namespace_body(name: &str, uid: &str) -> Value {
    let mut metadata = Mapping::new();
    metadata.insert(
        Value::String("name".to_string()),
        Value::String(name.to_string()),
    );
    metadata.insert(Value::String("uid".to_string()), Value::String(uid.to_string()));
    let mut body = Mapping::new();
    body.insert(
        Value::String("apiVersion".to_string()),
        Value::String("v1".to_string()),
    );
    body.insert(
        Value::String("kind".to_string()),
        Value::String("Namespace".to_string()),
    );
    body.insert(Value::String("metadata".to_string()), Value::Mapping(metadata));
    Value::Mapping(body)
}

const BUILTIN_TYPES: &[(&str, &str, &str, bool)] = &[
    ("v1", "Namespace", "namespaces", false),
    ("v1", "ServiceAccount", "serviceaccounts", true),
    ("v1", "Secret", "secrets", true),
    ("v1", "ConfigMap", "configmaps", true),
    ("v1", "Service", "services", true),
    ("v1", "Pod", "pods", true),
    ("v1", "PersistentVolumeClaim", "persistentvolumeclaims", true),
    ("v1", "LimitRange", "limitranges", true),
    ("v1", "ResourceQuota", "resourcequotas", true),
    ("apps/v1", "Deployment", "deployments", true),
    ("rbac.authorization.k8s.io/v1", "Role", "roles", true),
    ("rbac.authorization.k8s.io/v1", "RoleBinding", "rolebindings", true),
    ("rbac.authorization.k8s.io/v1", "ClusterRole", "clusterroles", false),
    (
        "rbac.authorization.k8s.io/v1",
        "ClusterRoleBinding",
        "clusterrolebindings",
        false,
    ),
    ("networking.k8s.io/v1", "Ingress", "ingresses", true),
    (TRAINING_API_VERSION, "Workshop", "workshops", false),
    (TRAINING_API_VERSION, "Session", "sessions", false),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn body(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn resource(cluster: &MemoryCluster, api_version: &str, kind: &str) -> ResourceType {
        cluster.resolve(api_version, kind).unwrap()
    }

    mod create_tests {
        use super::*;

        #[test]
        fn test_create_assigns_uid_and_namespace() {
            let cluster = MemoryCluster::new();
            let secrets = resource(&cluster, "v1", "Secret");
            let created = cluster
                .create(
                    &secrets,
                    Some("default"),
                    &body("apiVersion: v1\nkind: Secret\nmetadata:\n  name: creds"),
                )
                .unwrap();
            assert!(object::uid(&created).is_some());
            assert_eq!(object::namespace(&created), Some("default"));
            assert_eq!(cluster.created().len(), 1);
        }

        #[test]
        fn test_create_conflict() {
            let cluster = MemoryCluster::new();
            let namespaces = resource(&cluster, "v1", "Namespace");
            let ns = body("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: lab");
            cluster.create(&namespaces, None, &ns).unwrap();
            let err = cluster.create(&namespaces, None, &ns).unwrap_err();
            assert!(err.is_conflict());
        }

        #[test]
        fn test_create_in_missing_namespace() {
            let cluster = MemoryCluster::new();
            let secrets = resource(&cluster, "v1", "Secret");
            let err = cluster
                .create(
                    &secrets,
                    Some("nowhere"),
                    &body("apiVersion: v1\nkind: Secret\nmetadata:\n  name: creds"),
                )
                .unwrap_err();
            assert!(err.is_not_found());
            assert!(err.to_string().contains("nowhere"));
        }

        #[test]
        fn test_create_cluster_scoped_drops_namespace() {
            let cluster = MemoryCluster::new();
            let namespaces = resource(&cluster, "v1", "Namespace");
            let created = cluster
                .create(
                    &namespaces,
                    Some("default"),
                    &body("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: lab\n  namespace: x"),
                )
                .unwrap();
            assert_eq!(object::namespace(&created), None);
        }

        #[test]
        fn test_injected_conflicts_are_consumed() {
            let cluster = MemoryCluster::new();
            let namespaces = resource(&cluster, "v1", "Namespace");
            cluster.inject_conflicts("Namespace", 2);
            for attempt in 0..2 {
                let ns = body(&format!(
                    "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: lab-{}",
                    attempt
                ));
                assert!(cluster.create(&namespaces, None, &ns).unwrap_err().is_conflict());
            }
            let ns = body("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: lab-ok");
            assert!(cluster.create(&namespaces, None, &ns).is_ok());
        }

        #[test]
        fn test_seed_is_not_recorded() {
            let cluster = MemoryCluster::new();
            cluster
                .seed(body(
                    "apiVersion: v1\nkind: LimitRange\nmetadata:\n  name: old\n  namespace: default",
                ))
                .unwrap();
            assert!(cluster.created().is_empty());
            assert!(cluster.find("LimitRange", Some("default"), "old").is_some());
        }
    }

    mod delete_tests {
        use super::*;

        #[test]
        fn test_delete_missing_is_not_found() {
            let cluster = MemoryCluster::new();
            let sessions = resource(&cluster, TRAINING_API_VERSION, "Session");
            let err = cluster.delete(&sessions, None, "lab-xxxxx").unwrap_err();
            assert!(err.is_not_found());
        }

        #[test]
        fn test_delete_collects_owned_objects_transitively() {
            let cluster = MemoryCluster::new();
            let sessions = resource(&cluster, TRAINING_API_VERSION, "Session");
            let namespaces = resource(&cluster, "v1", "Namespace");
            let secrets = resource(&cluster, "v1", "Secret");

            let session = cluster
                .create(
                    &sessions,
                    None,
                    &body("apiVersion: training.eduk8s.io/v1alpha1\nkind: Session\nmetadata:\n  name: lab-b"),
                )
                .unwrap();
            let owner = object::owner_reference(&session, true).unwrap();

            let mut ns = body("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: lab-b");
            object::set_owner_references(&mut ns, &[owner.clone()]).unwrap();
            cluster.create(&namespaces, None, &ns).unwrap();

            let inside = body("apiVersion: v1\nkind: Secret\nmetadata:\n  name: inside");
            cluster.create(&secrets, Some("lab-b"), &inside).unwrap();

            let mut outside = body("apiVersion: v1\nkind: Secret\nmetadata:\n  name: outside");
            object::set_owner_references(&mut outside, &[owner]).unwrap();
            cluster.create(&secrets, Some("default"), &outside).unwrap();

            let unrelated = body("apiVersion: v1\nkind: Secret\nmetadata:\n  name: unrelated");
            cluster.create(&secrets, Some("default"), &unrelated).unwrap();

            cluster.delete(&sessions, None, "lab-b").unwrap();

            assert!(cluster.find("Namespace", None, "lab-b").is_none());
            assert!(cluster.find("Secret", Some("lab-b"), "inside").is_none());
            assert!(cluster.find("Secret", Some("default"), "outside").is_none());
            assert!(cluster.find("Secret", Some("default"), "unrelated").is_some());
            assert_eq!(cluster.deleted().len(), 4);
        }
    }

    mod patch_tests {
        use super::*;

        #[test]
        fn test_patch_merges_and_removes() {
            let cluster = MemoryCluster::new();
            let workshops = resource(&cluster, TRAINING_API_VERSION, "Workshop");
            cluster
                .create(
                    &workshops,
                    None,
                    &body("apiVersion: training.eduk8s.io/v1alpha1\nkind: Workshop\nmetadata:\n  name: lab\nspec:\n  image: a\n  title: t"),
                )
                .unwrap();
            let patched = cluster
                .patch(
                    &workshops,
                    None,
                    "lab",
                    &body("status:\n  enabled: true\nspec:\n  title: null"),
                )
                .unwrap();
            assert_eq!(patched["status"]["enabled"], Value::Bool(true));
            assert_eq!(patched["spec"]["image"], Value::String("a".to_string()));
            assert!(patched["spec"].get("title").is_none());
        }

        #[test]
        fn test_patch_missing_is_not_found() {
            let cluster = MemoryCluster::new();
            let workshops = resource(&cluster, TRAINING_API_VERSION, "Workshop");
            let err = cluster
                .patch(&workshops, None, "missing", &body("status: {}"))
                .unwrap_err();
            assert!(err.is_not_found());
        }

        #[test]
        fn test_merge_patch_replaces_sequences() {
            let mut target = body("items: [a, b]");
            merge_patch(&mut target, &body("items: [c]")).unwrap();
            assert_eq!(target, body("items: [c]"));
        }

        #[test]
        fn test_merge_patch_null_removes_key() {
            let mut target = body("status:\n  enabled: true\n  phase: Running\nspec:\n  image: a");
            merge_patch(&mut target, &body("status:\n  phase: null\n  enabled: false")).unwrap();
            assert_eq!(
                target,
                body("status:\n  enabled: false\nspec:\n  image: a")
            );
        }

        #[test]
        fn test_merge_patch_scalar_target_becomes_mapping() {
            let mut target = body("status: pending");
            merge_patch(&mut target, &body("status:\n  enabled: true")).unwrap();
            assert_eq!(target["status"]["enabled"], Value::Bool(true));
        }
    }

    mod discovery_tests {
        use super::*;

        #[test]
        fn test_resolve_unknown_kind() {
            let cluster = MemoryCluster::new();
            let err = cluster.resolve("example.com/v1", "Widget").unwrap_err();
            assert_eq!(
                err.to_string(),
                "The server doesn't have a resource type example.com/v1/Widget."
            );
        }

        #[test]
        fn test_namespaced_kinds() {
            let cluster = MemoryCluster::new();
            let kinds = cluster.namespaced_kinds().unwrap();
            assert!(kinds.contains(&ResourceKey::new("apps/v1", "Deployment")));
            assert!(kinds.contains(&ResourceKey::new("v1", "LimitRange")));
            assert!(!kinds.contains(&ResourceKey::new("v1", "Namespace")));
            assert!(!kinds.contains(&ResourceKey::new(TRAINING_API_VERSION, "Session")));
        }

        #[test]
        fn test_broken_discovery_is_skipped() {
            let cluster = MemoryCluster::new();
            cluster.break_discovery("apps/v1");
            let kinds = cluster.namespaced_kinds().unwrap();
            assert!(!kinds.contains(&ResourceKey::new("apps/v1", "Deployment")));
            assert!(kinds.contains(&ResourceKey::new("v1", "Secret")));
        }

        #[test]
        fn test_register_replaces_existing_type() {
            let cluster = MemoryCluster::new();
            cluster.register(ResourceType::new("v1", "Secret", "secrets", false));
            assert!(!resource(&cluster, "v1", "Secret").namespaced);
        }
    }
}
