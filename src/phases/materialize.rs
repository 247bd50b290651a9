//! Creating a workshop's per-session template objects.
//!
//! Objects are created one by one in template order, since later objects may
//! live in a Namespace created by an earlier one. For each object:
//!
//! 1. `$(...)` tokens are substituted.
//! 2. A namespaced object without a namespace goes into the session namespace.
//! 3. Cluster-scoped objects and objects in the workshop namespace get a
//!    controller owner reference to the Session. Everything else sits in a
//!    namespace the Session already owns.
//! 4. The object is created.
//! 5. A created Namespace is governed like the session namespace, with role
//!    and budget taken from its `session/role` and `session/budget`
//!    annotations when present.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use log::{debug, info};
use serde_yaml::Value;

use super::governance::{self, Target};
use super::{create_object, Resources, SessionContext};
use crate::budget::BudgetTable;
use crate::cluster::{ClusterApi, ResourceType};
use crate::defaults::{BUDGET_ANNOTATION, ROLE_ANNOTATION};
use crate::error::Result;
use crate::object::{self, ResourceKey};
use crate::substitute::substitute;

/// Resolves the type of every template object, failing on the first one the
/// cluster does not serve.
pub fn resolve_template_types(
    cluster: &dyn ClusterApi,
    objects: &[Value],
) -> Result<Vec<ResourceType>> {
    objects
        .iter()
        .map(|template| {
            let key = ResourceKey::of(template)?;
            cluster.resolve(&key.api_version, &key.kind)
        })
        .collect()
}

/// Creates `objects` for the session. `types` holds the resolved type of
/// each object, in the same order.
///
/// Returns the objects as stored.
pub fn materialize(
    cluster: &dyn ClusterApi,
    resources: &Resources,
    budgets: &BudgetTable,
    context: &SessionContext,
    objects: &[Value],
    types: &[ResourceType],
) -> Result<Vec<Value>> {
    if objects.is_empty() {
        debug!("workshop {} has no session objects", context.workshop.name);
        return Ok(Vec::new());
    }

    let namespaced = cluster.namespaced_kinds()?;
    let bindings = context.bindings();
    let owner = context.owner()?;
    let mut created = Vec::with_capacity(objects.len());

    for (template, resource) in objects.iter().zip(types) {
        let mut body = substitute(template, &bindings);
        let key = ResourceKey::of(&body)?;
        let is_namespaced = namespaced.contains(&key);

        if is_namespaced && object::namespace(&body).is_none() {
            object::set_namespace(&mut body, context.session_namespace())?;
        }
        let namespace = object::namespace(&body).map(str::to_string);

        if !is_namespaced || namespace.as_deref() == Some(context.workshop_namespace.as_str()) {
            object::set_owner_references(&mut body, std::slice::from_ref(&owner))?;
        }

        let stored = create_object(cluster, resource, namespace.as_deref(), &body)?;

        if key.kind.eq_ignore_ascii_case("namespace") {
            govern_namespace(cluster, resources, budgets, context, &stored, &owner)?;
        }
        created.push(stored);
    }

    info!(
        "created {} template objects for session {}",
        created.len(),
        context.session_name
    );
    Ok(created)
}

fn govern_namespace(
    cluster: &dyn ClusterApi,
    resources: &Resources,
    budgets: &BudgetTable,
    context: &SessionContext,
    namespace: &Value,
    owner: &OwnerReference,
) -> Result<()> {
    let name = object::require_name(namespace)?;
    let service_account = context.service_account();
    let target = Target {
        namespace: &name,
        workshop_namespace: &context.workshop_namespace,
        service_account: &service_account,
        role: object::annotation(namespace, ROLE_ANNOTATION).unwrap_or(&context.role),
        budget: object::annotation(namespace, BUDGET_ANNOTATION).unwrap_or(&context.budget),
    };
    debug!(
        "governing template namespace {} (role {}, budget {})",
        name, target.role, target.budget
    );
    governance::apply_governance(cluster, resources, budgets, &target, owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::MemoryCluster;
    use crate::workshop::Workshop;

    const SESSION: &str = "lab-b4c9z";

    /// A cluster holding the Session and its namespace.
    fn setup() -> (MemoryCluster, Resources, SessionContext) {
        let cluster = MemoryCluster::new();
        let session = cluster
            .seed(
                serde_yaml::from_str(&format!(
                    "apiVersion: training.eduk8s.io/v1alpha1\nkind: Session\nmetadata:\n  name: {SESSION}"
                ))
                .unwrap(),
            )
            .unwrap();
        cluster
            .seed(
                serde_yaml::from_str(&format!(
                    "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: {SESSION}"
                ))
                .unwrap(),
            )
            .unwrap();
        let workshop = Workshop::from_object(
            serde_yaml::from_str(
                "apiVersion: training.eduk8s.io/v1alpha1\nkind: Workshop\nmetadata:\n  name: lab\n  uid: w-1",
            )
            .unwrap(),
        )
        .unwrap();
        let context = SessionContext {
            workshop,
            workshop_namespace: "default".to_string(),
            session_uid: object::require_uid(&session).unwrap(),
            session,
            session_name: SESSION.to_string(),
            user_id: "b4c9z".to_string(),
            role: "admin".to_string(),
            budget: "default".to_string(),
        };
        let resources = Resources::resolve(&cluster, false).unwrap();
        (cluster, resources, context)
    }

    fn objects(yaml: &str) -> Vec<Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn run(
        cluster: &MemoryCluster,
        resources: &Resources,
        context: &SessionContext,
        yaml: &str,
    ) -> Result<Vec<Value>> {
        let objects = objects(yaml);
        let types = resolve_template_types(cluster, &objects)?;
        let budgets = BudgetTable::embedded()?;
        materialize(cluster, resources, &budgets, context, &objects, &types)
    }

    mod placement_tests {
        use super::*;

        #[test]
        fn test_namespaced_object_defaults_to_session_namespace() {
            let (cluster, resources, context) = setup();
            run(
                &cluster,
                &resources,
                &context,
                "- apiVersion: v1\n  kind: ConfigMap\n  metadata:\n    name: settings\n",
            )
            .unwrap();

            let config = cluster.find("ConfigMap", Some(SESSION), "settings").unwrap();
            assert!(object::owner_uids(&config).is_empty());
        }

        #[test]
        fn test_workshop_namespace_object_is_owned() {
            let (cluster, resources, context) = setup();
            run(
                &cluster,
                &resources,
                &context,
                "- apiVersion: v1\n  kind: Secret\n  metadata:\n    name: creds-$(user_id)\n    namespace: $(workshop_namespace)\n",
            )
            .unwrap();

            let secret = cluster.find("Secret", Some("default"), "creds-b4c9z").unwrap();
            assert_eq!(object::owner_uids(&secret), vec![context.session_uid.as_str()]);
        }

        #[test]
        fn test_cluster_scoped_object_is_owned() {
            let (cluster, resources, context) = setup();
            run(
                &cluster,
                &resources,
                &context,
                "- apiVersion: rbac.authorization.k8s.io/v1\n  kind: ClusterRole\n  metadata:\n    name: $(session_name)-viewer\n",
            )
            .unwrap();

            let role = cluster.find("ClusterRole", None, "lab-b4c9z-viewer").unwrap();
            assert_eq!(object::owner_uids(&role), vec![context.session_uid.as_str()]);
        }

        #[test]
        fn test_template_order_is_preserved() {
            let (cluster, resources, context) = setup();
            run(
                &cluster,
                &resources,
                &context,
                r#"
- apiVersion: v1
  kind: Namespace
  metadata:
    name: $(session_namespace)-extra
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: inside
    namespace: $(session_namespace)-extra
"#,
            )
            .unwrap();

            let created: Vec<String> = cluster.created().iter().map(|k| k.kind.clone()).collect();
            assert_eq!(created, vec!["Namespace", "RoleBinding", "ConfigMap"]);
            assert!(cluster
                .find("ConfigMap", Some("lab-b4c9z-extra"), "inside")
                .is_some());
        }

        #[test]
        fn test_unserved_kind_fails_before_creating() {
            let (cluster, _resources, _context) = setup();
            let err = resolve_template_types(
                &cluster,
                &objects("- apiVersion: example.com/v1\n  kind: Widget\n  metadata:\n    name: w\n"),
            )
            .unwrap_err();
            assert!(err.is_not_found());
            assert!(cluster.created().is_empty());
        }
    }

    mod namespace_governance_tests {
        use super::*;

        #[test]
        fn test_created_namespace_uses_annotations() {
            let (cluster, resources, context) = setup();
            run(
                &cluster,
                &resources,
                &context,
                r#"
- apiVersion: v1
  kind: Namespace
  metadata:
    name: $(session_namespace)-build
    annotations:
      session/role: view
      session/budget: small
"#,
            )
            .unwrap();

            let namespace = cluster.find("Namespace", None, "lab-b4c9z-build").unwrap();
            assert_eq!(object::owner_uids(&namespace), vec![context.session_uid.as_str()]);

            let binding = cluster
                .find("RoleBinding", Some("lab-b4c9z-build"), "eduk8s")
                .unwrap();
            assert_eq!(object::str_at(&binding, &["roleRef", "name"]), Some("view"));
            assert_eq!(binding["subjects"][0]["name"], Value::from("user-b4c9z"));
            assert_eq!(
                cluster.objects_of_kind("ResourceQuota", Some("lab-b4c9z-build")).len(),
                3
            );
        }

        #[test]
        fn test_created_namespace_falls_back_to_session_defaults() {
            let (cluster, resources, mut context) = setup();
            context.role = "edit".to_string();
            run(
                &cluster,
                &resources,
                &context,
                "- apiVersion: v1\n  kind: Namespace\n  metadata:\n    name: plain\n",
            )
            .unwrap();

            let binding = cluster.find("RoleBinding", Some("plain"), "eduk8s").unwrap();
            assert_eq!(object::str_at(&binding, &["roleRef", "name"]), Some("edit"));
            assert!(cluster.objects_of_kind("LimitRange", Some("plain")).is_empty());
        }

        #[test]
        fn test_deleting_session_collects_everything() {
            let (cluster, resources, context) = setup();
            run(
                &cluster,
                &resources,
                &context,
                r#"
- apiVersion: v1
  kind: Namespace
  metadata:
    name: $(session_namespace)-build
    annotations:
      session/budget: small
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: inside
    namespace: $(session_namespace)-build
"#,
            )
            .unwrap();

            let sessions = cluster.resolve("training.eduk8s.io/v1alpha1", "Session").unwrap();
            cluster.delete(&sessions, None, SESSION).unwrap();
            assert!(cluster.objects_of_kind("ConfigMap", None).is_empty());
            assert!(cluster.objects_of_kind("ResourceQuota", None).is_empty());
            assert!(cluster.find("Namespace", None, "lab-b4c9z-build").is_none());
        }
    }

    mod discovery_tests {
        use super::*;

        #[test]
        fn test_discovery_failure_is_logged() {
            testing_logger::setup();
            let (cluster, resources, context) = setup();
            cluster.break_discovery("apps/v1");
            run(
                &cluster,
                &resources,
                &context,
                "- apiVersion: v1\n  kind: ConfigMap\n  metadata:\n    name: settings\n",
            )
            .unwrap();

            testing_logger::validate(|captured_logs| {
                assert!(captured_logs.iter().any(|log| {
                    log.level == log::Level::Warn
                        && log.body.contains("Skipping Deployment while discovering namespaced kinds")
                }));
            });
        }
    }
}
