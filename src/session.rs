//! # Sessions
//!
//! A Session (`training.eduk8s.io/v1alpha1`, kind `Session`) records one
//! provisioned instance of a workshop. It is cluster-scoped and owns every
//! object created for the session, so deleting it reclaims everything.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde::Serialize;
use serde_yaml::Value;

use crate::cluster::{ClusterApi, ResourceType};
use crate::defaults::TRAINING_API_VERSION;
use crate::error::Result;
use crate::object;
use crate::workshop::Workshop;

/// The `spec` of a Session, copied from its workshop at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSpec {
    pub vendor: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub image: String,
    pub budget: String,
    pub role: String,
    pub duration: String,
    pub timeout: String,
}

impl SessionSpec {
    /// Copies the session fields out of a workshop.
    pub fn for_workshop(workshop: &Workshop, role: &str, budget: &str) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        Self {
            vendor: text(&workshop.spec.vendor),
            name: workshop.name.clone(),
            title: text(&workshop.spec.title),
            description: text(&workshop.spec.description),
            url: text(&workshop.spec.url),
            image: text(&workshop.spec.image),
            budget: budget.to_string(),
            role: role.to_string(),
            duration: workshop
                .spec
                .duration
                .clone()
                .unwrap_or_else(|| "0".to_string()),
            timeout: workshop
                .spec
                .timeout
                .clone()
                .unwrap_or_else(|| "0".to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionObject<'a> {
    api_version: &'a str,
    kind: &'a str,
    metadata: ObjectMeta,
    spec: &'a SessionSpec,
}

/// Builds the body of a Session named `name`.
pub fn session_body(
    name: &str,
    spec: &SessionSpec,
    owner: Option<OwnerReference>,
) -> Result<Value> {
    object::to_object(&SessionObject {
        api_version: TRAINING_API_VERSION,
        kind: "Session",
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            owner_references: owner.map(|owner| vec![owner]),
            ..Default::default()
        },
        spec,
    })
}

/// One row of `session list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub name: String,
    pub image: String,
    pub url: String,
}

/// Resolves the Session resource type.
pub fn resource(cluster: &dyn ClusterApi) -> Result<ResourceType> {
    cluster.resolve(TRAINING_API_VERSION, "Session")
}

/// Lists sessions, sorted by name.
pub fn list(cluster: &dyn ClusterApi) -> Result<Vec<SessionSummary>> {
    let sessions = resource(cluster)?;
    let mut found: Vec<SessionSummary> = cluster
        .list(&sessions, None)?
        .iter()
        .map(|body| SessionSummary {
            name: object::name(body).unwrap_or_default().to_string(),
            image: object::str_at(body, &["spec", "image"])
                .unwrap_or_default()
                .to_string(),
            url: object::str_at(body, &["spec", "url"])
                .unwrap_or_default()
                .to_string(),
        })
        .collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Deletes a session; the cluster collects everything it owns.
pub fn delete(cluster: &dyn ClusterApi, name: &str) -> Result<()> {
    let sessions = resource(cluster)?;
    cluster.delete(&sessions, None, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::MemoryCluster;

    fn workshop() -> Workshop {
        Workshop::from_object(
            serde_yaml::from_str(
                r#"
apiVersion: training.eduk8s.io/v1alpha1
kind: Workshop
metadata:
  name: lab
  uid: w-1
spec:
  title: Lab
  url: https://example.com/lab
  image: lab:latest
  duration: 30m
"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_spec_copies_workshop_fields() {
        let spec = SessionSpec::for_workshop(&workshop(), "admin", "small");
        assert_eq!(spec.name, "lab");
        assert_eq!(spec.title, "Lab");
        assert_eq!(spec.vendor, "");
        assert_eq!(spec.duration, "30m");
        assert_eq!(spec.timeout, "0");
        assert_eq!(spec.budget, "small");
    }

    #[test]
    fn test_session_body_shape() {
        let workshop = workshop();
        let spec = SessionSpec::for_workshop(&workshop, "admin", "default");
        let owner = workshop.owner_reference().unwrap();
        let body = session_body("lab-b4c9z", &spec, Some(owner)).unwrap();

        assert_eq!(object::api_version(&body), Some(TRAINING_API_VERSION));
        assert_eq!(object::kind(&body), Some("Session"));
        assert_eq!(object::name(&body), Some("lab-b4c9z"));
        assert_eq!(object::owner_uids(&body), vec!["w-1"]);
        assert_eq!(
            body["metadata"]["ownerReferences"][0]["controller"],
            Value::Bool(false)
        );
        assert_eq!(object::str_at(&body, &["spec", "image"]), Some("lab:latest"));
        assert_eq!(object::str_at(&body, &["spec", "role"]), Some("admin"));
    }

    #[test]
    fn test_session_body_without_owner() {
        let spec = SessionSpec::for_workshop(&workshop(), "admin", "default");
        let body = session_body("lab-b4c9z", &spec, None).unwrap();
        assert!(body["metadata"].get("ownerReferences").is_none());
    }

    #[test]
    fn test_list_and_delete() {
        let cluster = MemoryCluster::new();
        let sessions = resource(&cluster).unwrap();
        let spec = SessionSpec::for_workshop(&workshop(), "admin", "default");
        for name in ["lab-zzzzz", "lab-bbbbb"] {
            cluster
                .create(&sessions, None, &session_body(name, &spec, None).unwrap())
                .unwrap();
        }

        let listed = list(&cluster).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "lab-bbbbb");
        assert_eq!(listed[0].url, "https://example.com/lab");

        delete(&cluster, "lab-bbbbb").unwrap();
        assert_eq!(list(&cluster).unwrap().len(), 1);
        assert!(delete(&cluster, "lab-bbbbb").unwrap_err().is_not_found());
    }
}
