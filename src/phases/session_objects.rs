//! Objects every session gets regardless of its workshop: the session's
//! service account and the binding that lets it use the workshop console.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_yaml::Value;

use super::{create_object, Resources, SessionContext};
use crate::cluster::ClusterApi;
use crate::error::Result;
use crate::object;

fn service_account(context: &SessionContext) -> Result<Value> {
    object::to_object(&ServiceAccount {
        metadata: ObjectMeta {
            name: Some(context.service_account()),
            namespace: Some(context.workshop_namespace.clone()),
            owner_references: Some(vec![context.owner()?]),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn console_binding(context: &SessionContext) -> Result<Value> {
    object::to_object(&ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(format!("{}-console", context.session_name)),
            owner_references: Some(vec![context.owner()?]),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: format!("{}-console", context.workshop.name),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: context.service_account(),
            namespace: Some(context.workshop_namespace.clone()),
            ..Default::default()
        }]),
    })
}

/// Creates the service account in the workshop namespace and binds it to the
/// workshop's console cluster role.
pub fn create_session_objects(
    cluster: &dyn ClusterApi,
    resources: &Resources,
    context: &SessionContext,
) -> Result<()> {
    create_object(
        cluster,
        &resources.service_account,
        Some(&context.workshop_namespace),
        &service_account(context)?,
    )?;
    create_object(
        cluster,
        &resources.cluster_role_binding,
        None,
        &console_binding(context)?,
    )?;
    Ok(())
}
