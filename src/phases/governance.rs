//! Namespace governance: the role binding plus the limit range and quotas of
//! a budget.
//!
//! Applied to the session namespace and to every Namespace a workshop
//! template creates. Existing limit ranges and quotas are removed before a
//! budget's own are created, so reapplying a budget replaces rather than
//! stacks.

use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use log::debug;
use serde_yaml::Value;

use super::{create_object, delete_if_exists, Resources};
use crate::budget::{BudgetTable, Selection};
use crate::cluster::{ClusterApi, ResourceType};
use crate::error::Result;
use crate::object;

/// Name of the role binding created in governed namespaces.
pub const ROLE_BINDING_NAME: &str = "eduk8s";

/// The namespace to govern and who gets access to it.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub namespace: &'a str,
    /// Namespace holding the service account.
    pub workshop_namespace: &'a str,
    pub service_account: &'a str,
    /// Cluster role granted to the service account.
    pub role: &'a str,
    pub budget: &'a str,
}

fn role_binding(target: &Target<'_>, owner: &OwnerReference) -> Result<Value> {
    object::to_object(&RoleBinding {
        metadata: ObjectMeta {
            name: Some(ROLE_BINDING_NAME.to_string()),
            namespace: Some(target.namespace.to_string()),
            owner_references: Some(vec![owner.clone()]),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: target.role.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: target.service_account.to_string(),
            namespace: Some(target.workshop_namespace.to_string()),
            ..Default::default()
        }]),
    })
}

/// Deletes every instance of `resource` in `namespace`.
fn clear(cluster: &dyn ClusterApi, resource: &ResourceType, namespace: &str) -> Result<()> {
    for existing in cluster.list(resource, Some(namespace))? {
        if let Some(name) = object::name(&existing) {
            delete_if_exists(cluster, resource, Some(namespace), name)?;
        }
    }
    Ok(())
}

fn create_owned(
    cluster: &dyn ClusterApi,
    resource: &ResourceType,
    namespace: &str,
    template: &Value,
    owner: &OwnerReference,
) -> Result<()> {
    let mut body = template.clone();
    object::set_owner_references(&mut body, std::slice::from_ref(owner))?;
    create_object(cluster, resource, Some(namespace), &body)?;
    Ok(())
}

/// Binds the role and applies the budget to `target.namespace`.
///
/// `default` leaves limits and quotas alone, `unlimited` removes them, and a
/// budget from the table replaces them with its own. Every object created is
/// owned by `owner`.
pub fn apply_governance(
    cluster: &dyn ClusterApi,
    resources: &Resources,
    budgets: &BudgetTable,
    target: &Target<'_>,
    owner: &OwnerReference,
) -> Result<()> {
    let binding = role_binding(target, owner)?;
    create_object(cluster, &resources.role_binding, Some(target.namespace), &binding)?;

    let budget = match budgets.select(target.budget) {
        Selection::Default => {
            debug!("namespace {} keeps its default limits", target.namespace);
            return Ok(());
        }
        Selection::Unlimited => None,
        Selection::Limited(budget) => Some(budget),
    };

    clear(cluster, &resources.limit_range, target.namespace)?;
    if let Some(budget) = budget {
        create_owned(
            cluster,
            &resources.limit_range,
            target.namespace,
            &budget.resource_limits,
            owner,
        )?;
    }

    clear(cluster, &resources.resource_quota, target.namespace)?;
    if let Some(budget) = budget {
        for quota in budget.quotas() {
            create_owned(cluster, &resources.resource_quota, target.namespace, quota, owner)?;
        }
    }

    debug!(
        "applied budget {} to namespace {}",
        target.budget, target.namespace
    );
    Ok(())
}
