//! The workshop workload: a Deployment running the workshop image, a Service
//! in front of it, and an Ingress when the session has a hostname.
//!
//! All three live in the workshop namespace, are named `workshop-{user_id}`,
//! and are owned by the Session. The workshop's `session.patches` are
//! substituted and overlay-merged into the pod spec before the Deployment is
//! created.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use log::debug;
use rand::Rng;
use serde_yaml::Value;

use super::identity::generate_password;
use super::{create_object, Resources, SessionContext};
use crate::cluster::ClusterApi;
use crate::defaults::WORKSHOP_PORT;
use crate::error::{Error, Result};
use crate::merge::overlay::overlay_merge;
use crate::merge::pod_spec_mut;
use crate::object;
use crate::substitute::substitute;

/// Basic-auth credentials for the workshop container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// True when the password was generated rather than supplied.
    pub generated: bool,
}

impl Credentials {
    /// Credentials for `username`, generating a password when none is given.
    ///
    /// Without a username the workshop runs without authentication and any
    /// password is ignored.
    pub fn resolve<R: Rng>(
        username: Option<&str>,
        password: Option<&str>,
        rng: &mut R,
    ) -> Option<Self> {
        let username = username?;
        Some(match password {
            Some(password) => Self {
                username: username.to_string(),
                password: password.to_string(),
                generated: false,
            },
            None => Self {
                username: username.to_string(),
                password: generate_password(rng),
                generated: true,
            },
        })
    }
}

/// How to reach a deployed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub session_name: String,
    /// Namespace holding the workshop service.
    pub namespace: String,
    pub service: String,
    pub port: i32,
    /// Set when an ingress was created.
    pub url: Option<String>,
    pub credentials: Option<Credentials>,
}

/// Host the session is exposed on: an explicit hostname, else
/// `{session}.{domain}`.
pub fn session_hostname(
    session_name: &str,
    hostname: Option<&str>,
    domain: Option<&str>,
) -> Option<String> {
    hostname
        .map(str::to_string)
        .or_else(|| domain.map(|domain| format!("{}.{}", session_name, domain)))
}

fn labels(context: &SessionContext) -> BTreeMap<String, String> {
    BTreeMap::from([("deployment".to_string(), context.workload_name())])
}

fn metadata(context: &SessionContext, owner: &OwnerReference) -> ObjectMeta {
    ObjectMeta {
        name: Some(context.workload_name()),
        namespace: Some(context.workshop_namespace.clone()),
        owner_references: Some(vec![owner.clone()]),
        ..Default::default()
    }
}

fn env(context: &SessionContext, credentials: Option<&Credentials>) -> Vec<EnvVar> {
    let var = |name: &str, value: &str| EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    };
    let mut env = vec![var("SESSION_NAMESPACE", context.session_namespace())];
    if let Some(credentials) = credentials {
        env.push(var("AUTH_USERNAME", &credentials.username));
        env.push(var("AUTH_PASSWORD", &credentials.password));
    }
    env
}

/// Builds the workshop Deployment, with the workshop's patches applied.
pub fn deployment_body(
    context: &SessionContext,
    credentials: Option<&Credentials>,
    owner: &OwnerReference,
) -> Result<Value> {
    let mut body = object::to_object(&Deployment {
        metadata: metadata(context, owner),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels(context)),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(context)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(context.service_account()),
                    containers: vec![Container {
                        name: "workshop".to_string(),
                        image: Some(context.workshop.image().to_string()),
                        image_pull_policy: Some("Always".to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: WORKSHOP_PORT,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        env: Some(env(context, credentials)),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })?;

    if let Some(patches) = &context.workshop.spec.session.patches {
        let patch = substitute(patches, &context.bindings());
        let pod_spec = pod_spec_mut(&mut body)?;
        overlay_merge(pod_spec, &patch);
        debug!("applied workshop patches to {}", context.workload_name());
    }
    Ok(body)
}

pub fn service_body(context: &SessionContext, owner: &OwnerReference) -> Result<Value> {
    object::to_object(&Service {
        metadata: metadata(context, owner),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(vec![ServicePort {
                port: WORKSHOP_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(WORKSHOP_PORT)),
                ..Default::default()
            }]),
            selector: Some(labels(context)),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn ingress_body(
    context: &SessionContext,
    host: &str,
    ingress_class: Option<&str>,
    owner: &OwnerReference,
) -> Result<Value> {
    object::to_object(&Ingress {
        metadata: metadata(context, owner),
        spec: Some(IngressSpec {
            ingress_class_name: ingress_class.map(str::to_string),
            rules: Some(vec![IngressRule {
                host: Some(host.to_string()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: context.workload_name(),
                                port: Some(ServiceBackendPort {
                                    number: Some(WORKSHOP_PORT),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Creates the Deployment, the Service and, when `host` is set, the Ingress.
pub fn deploy_workload(
    cluster: &dyn ClusterApi,
    resources: &Resources,
    context: &SessionContext,
    credentials: Option<Credentials>,
    host: Option<&str>,
    ingress_class: Option<&str>,
) -> Result<ConnectionInfo> {
    let owner = context.owner()?;
    let namespace = Some(context.workshop_namespace.as_str());

    let deployment = deployment_body(context, credentials.as_ref(), &owner)?;
    create_object(cluster, &resources.deployment, namespace, &deployment)?;

    let service = service_body(context, &owner)?;
    create_object(cluster, &resources.service, namespace, &service)?;

    let url = match host {
        Some(host) => {
            let ingresses = resources.ingress.as_ref().ok_or_else(|| {
                Error::ResourceTypeNotFound {
                    api_version: "networking.k8s.io/v1".to_string(),
                    kind: "Ingress".to_string(),
                }
            })?;
            let ingress = ingress_body(context, host, ingress_class, &owner)?;
            create_object(cluster, ingresses, namespace, &ingress)?;
            Some(format!("http://{}/", host))
        }
        None => None,
    };

    Ok(ConnectionInfo {
        session_name: context.session_name.clone(),
        namespace: context.workshop_namespace.clone(),
        service: context.workload_name(),
        port: WORKSHOP_PORT,
        url,
        credentials,
    })
}
