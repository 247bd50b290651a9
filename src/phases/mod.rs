//! Implementation of the stages of session provisioning.
//!
//! ## Overview
//!
//! Deploying a workshop session runs these stages in order:
//! 1. Allocating Identity - Pick a free session name; create the Session and its namespace
//! 2. Creating Session-Owned Objects - Service account and console cluster role binding
//! 3. Applying Governance - Role binding, limit range and quotas in the session namespace
//! 4. Materializing Template Objects - Create the workshop's extra objects in template order
//! 5. Deploying Workload - Workshop deployment, service and optional ingress
//!
//! Before any of them, the workshop is fetched and checked, and every resource
//! type the run needs is resolved, so a run that cannot succeed changes nothing.
//!
//! Every object created after the Session is owned by it, directly or through
//! the session namespace, so deleting the Session reclaims everything. A run
//! that fails part way leaves its objects behind for that cascade.

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use log::debug;
use serde_yaml::Value;

use crate::cluster::{ClusterApi, ResourceType};
use crate::defaults::TRAINING_API_VERSION;
use crate::error::Result;
use crate::object;
use crate::substitute::Bindings;
use crate::workshop::Workshop;

// Stage modules
pub mod governance;
pub mod identity;
pub mod materialize;
pub mod orchestrator;
pub mod session_objects;
pub mod workload;

/// Where a provisioning run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    AllocatingIdentity,
    CreatingSessionOwnedObjects,
    ApplyingGovernance,
    MaterializingTemplateObjects,
    DeployingWorkload,
    Done,
    Failed,
}

impl Stage {
    /// The stage that follows this one on success.
    pub fn next(self) -> Stage {
        match self {
            Stage::Validating => Stage::AllocatingIdentity,
            Stage::AllocatingIdentity => Stage::CreatingSessionOwnedObjects,
            Stage::CreatingSessionOwnedObjects => Stage::ApplyingGovernance,
            Stage::ApplyingGovernance => Stage::MaterializingTemplateObjects,
            Stage::MaterializingTemplateObjects => Stage::DeployingWorkload,
            Stage::DeployingWorkload => Stage::Done,
            Stage::Done => Stage::Done,
            Stage::Failed => Stage::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Stage::Validating => "validating request",
            Stage::AllocatingIdentity => "allocating session identity",
            Stage::CreatingSessionOwnedObjects => "creating session-owned objects",
            Stage::ApplyingGovernance => "applying namespace governance",
            Stage::MaterializingTemplateObjects => "materializing template objects",
            Stage::DeployingWorkload => "deploying workshop workload",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Resource types a provisioning run touches, resolved before anything is
/// created.
#[derive(Debug, Clone)]
pub struct Resources {
    pub session: ResourceType,
    pub namespace: ResourceType,
    pub service_account: ResourceType,
    pub role_binding: ResourceType,
    pub cluster_role_binding: ResourceType,
    pub limit_range: ResourceType,
    pub resource_quota: ResourceType,
    pub deployment: ResourceType,
    pub service: ResourceType,
    /// Only resolved when the session gets an ingress.
    pub ingress: Option<ResourceType>,
}

impl Resources {
    pub fn resolve(cluster: &dyn ClusterApi, with_ingress: bool) -> Result<Self> {
        const RBAC: &str = "rbac.authorization.k8s.io/v1";
        Ok(Self {
            session: cluster.resolve(TRAINING_API_VERSION, "Session")?,
            namespace: cluster.resolve("v1", "Namespace")?,
            service_account: cluster.resolve("v1", "ServiceAccount")?,
            role_binding: cluster.resolve(RBAC, "RoleBinding")?,
            cluster_role_binding: cluster.resolve(RBAC, "ClusterRoleBinding")?,
            limit_range: cluster.resolve("v1", "LimitRange")?,
            resource_quota: cluster.resolve("v1", "ResourceQuota")?,
            deployment: cluster.resolve("apps/v1", "Deployment")?,
            service: cluster.resolve("v1", "Service")?,
            ingress: if with_ingress {
                Some(cluster.resolve("networking.k8s.io/v1", "Ingress")?)
            } else {
                None
            },
        })
    }
}

/// Everything known about a session once its identity is allocated.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub workshop: Workshop,
    /// Namespace holding the workshop deployment, service and service account.
    pub workshop_namespace: String,
    /// The Session as stored.
    pub session: Value,
    pub session_name: String,
    pub session_uid: String,
    /// Random suffix of the session name.
    pub user_id: String,
    /// Cluster role bound into session namespaces.
    pub role: String,
    /// Budget applied to session namespaces.
    pub budget: String,
}

impl SessionContext {
    /// The session namespace shares the session's name.
    pub fn session_namespace(&self) -> &str {
        &self.session_name
    }

    pub fn service_account(&self) -> String {
        format!("user-{}", self.user_id)
    }

    /// Name shared by the workshop deployment, service and ingress.
    pub fn workload_name(&self) -> String {
        format!("workshop-{}", self.user_id)
    }

    /// Controller owner reference pointing at the Session.
    pub fn owner(&self) -> Result<OwnerReference> {
        object::owner_reference(&self.session, true)
    }

    /// Values for `$(name)` tokens in template objects and patches.
    pub fn bindings(&self) -> Bindings {
        Bindings::new()
            .with("user_id", &self.user_id)
            .with("session_name", &self.session_name)
            .with("session_uid", &self.session_uid)
            .with("session_namespace", self.session_namespace())
            .with("service_account", self.service_account())
            .with("workshop_namespace", &self.workshop_namespace)
            .with("workshop_name", &self.workshop.name)
            .with("workshop_uid", self.workshop.uid.as_deref().unwrap_or_default())
    }
}

/// Creates an object and logs it.
pub(crate) fn create_object(
    cluster: &dyn ClusterApi,
    resource: &ResourceType,
    namespace: Option<&str>,
    body: &Value,
) -> Result<Value> {
    let created = cluster.create(resource, namespace, body)?;
    match object::namespace(&created) {
        Some(ns) => debug!("created {} in {}", object::describe(&created), ns),
        None => debug!("created {}", object::describe(&created)),
    }
    Ok(created)
}

/// Deletes an object, treating "not found" as success.
pub(crate) fn delete_if_exists(
    cluster: &dyn ClusterApi,
    resource: &ResourceType,
    namespace: Option<&str>,
    name: &str,
) -> Result<()> {
    match cluster.delete(resource, namespace, name) {
        Ok(()) => {
            debug!("deleted {}/{}", resource.kind, name);
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            debug!("{}/{} already gone", resource.kind, name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
