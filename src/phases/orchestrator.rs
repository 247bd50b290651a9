//! Orchestrator for the complete session deploy
//!
//! This module drives the stages in order and keeps track of which one is
//! running, so a failure can be reported against the stage it happened in.

use log::{error, info};
use rand::rngs::ThreadRng;
use rand::Rng;

use super::governance::{self, Target};
use super::identity;
use super::materialize;
use super::session_objects;
use super::workload::{self, ConnectionInfo, Credentials};
use super::{Resources, SessionContext, Stage};
use crate::budget::BudgetTable;
use crate::cluster::ClusterApi;
use crate::defaults::{DEFAULT_NAMESPACE, DEFAULT_ROLE, DEFAULT_SESSION_RETRIES};
use crate::error::Result;
use crate::session::SessionSpec;
use crate::workshop;

/// What to deploy and how the session is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Name of the Workshop to deploy.
    pub workshop: String,
    /// Namespace the Workshop is looked up in.
    pub namespace: String,
    /// Enables basic auth on the workshop container.
    pub username: Option<String>,
    /// Generated when a username is given without one.
    pub password: Option<String>,
    pub hostname: Option<String>,
    /// Exposes the session as `{session}.{domain}` when no hostname is given.
    pub domain: Option<String>,
}

impl DeployRequest {
    pub fn new(workshop: impl Into<String>) -> Self {
        Self {
            workshop: workshop.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            username: None,
            password: None,
            hostname: None,
            domain: None,
        }
    }

    fn wants_ingress(&self) -> bool {
        self.hostname.is_some() || self.domain.is_some()
    }
}

/// Settings that apply to every deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Retries after a session name conflict.
    pub session_retries: usize,
    /// Role bound when the workshop names none.
    pub default_role: String,
    pub ingress_class: Option<String>,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            session_retries: DEFAULT_SESSION_RETRIES,
            default_role: DEFAULT_ROLE.to_string(),
            ingress_class: None,
        }
    }
}

/// Runs one session deploy against a cluster.
pub struct Provisioner<'a, R: Rng> {
    cluster: &'a dyn ClusterApi,
    budgets: &'a BudgetTable,
    options: ProvisionOptions,
    rng: R,
    stage: Stage,
}

impl<'a, R: Rng> Provisioner<'a, R> {
    pub fn new(
        cluster: &'a dyn ClusterApi,
        budgets: &'a BudgetTable,
        options: ProvisionOptions,
        rng: R,
    ) -> Self {
        Self {
            cluster,
            budgets,
            options,
            rng,
            stage: Stage::Validating,
        }
    }

    /// The stage reached so far.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Deploys a session of `request.workshop`.
    ///
    /// Nothing is created unless the workshop exists, is enabled, and every
    /// resource type the deploy needs is served. A failure after the Session
    /// exists leaves what was created so far; deleting the Session removes it.
    pub fn provision(&mut self, request: &DeployRequest) -> Result<ConnectionInfo> {
        self.stage = Stage::Validating;
        match self.run(request) {
            Ok(info) => {
                self.enter(Stage::Done);
                Ok(info)
            }
            Err(err) => {
                error!("Session deploy failed while {}: {}", self.stage, err);
                self.stage = Stage::Failed;
                Err(err)
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!("Session deploy: {}", stage);
        self.stage = stage;
    }

    fn run(&mut self, request: &DeployRequest) -> Result<ConnectionInfo> {
        let cluster = self.cluster;

        // Validating: nothing may be created before this passes
        info!("Session deploy: {}", self.stage);
        let workshops = workshop::resource(cluster)?;
        let workshop = workshop::fetch(cluster, &request.workshop, &request.namespace)?;
        workshop.require_enabled()?;
        let resources = Resources::resolve(cluster, request.wants_ingress())?;
        let objects = workshop.spec.session.objects.clone();
        let template_types = materialize::resolve_template_types(cluster, &objects)?;
        let workshop_namespace = workshop.workshop_namespace(&request.namespace).to_string();
        let role = workshop.role(&self.options.default_role).to_string();
        let budget = workshop.budget().to_string();

        // Allocating identity
        self.enter(Stage::AllocatingIdentity);
        let spec = SessionSpec::for_workshop(&workshop, &role, &budget);
        let workshop_owner = if workshops.namespaced {
            None
        } else {
            Some(workshop.owner_reference()?)
        };
        let allocation = identity::allocate(
            cluster,
            &resources,
            &workshop.name,
            &spec,
            workshop_owner.as_ref(),
            self.options.session_retries,
            &mut self.rng,
        )?;
        info!("Allocated session {}", allocation.session_name);
        let context = SessionContext {
            workshop,
            workshop_namespace,
            session: allocation.session,
            session_name: allocation.session_name,
            session_uid: allocation.session_uid,
            user_id: allocation.user_id,
            role,
            budget,
        };
        let owner = context.owner()?;

        // Creating session-owned objects
        self.enter(Stage::CreatingSessionOwnedObjects);
        session_objects::create_session_objects(cluster, &resources, &context)?;

        // Applying governance to the session namespace
        self.enter(Stage::ApplyingGovernance);
        let service_account = context.service_account();
        governance::apply_governance(
            cluster,
            &resources,
            self.budgets,
            &Target {
                namespace: context.session_namespace(),
                workshop_namespace: &context.workshop_namespace,
                service_account: &service_account,
                role: &context.role,
                budget: &context.budget,
            },
            &owner,
        )?;

        // Materializing template objects
        self.enter(Stage::MaterializingTemplateObjects);
        materialize::materialize(
            cluster,
            &resources,
            self.budgets,
            &context,
            &objects,
            &template_types,
        )?;

        // Deploying workload
        self.enter(Stage::DeployingWorkload);
        let credentials = Credentials::resolve(
            request.username.as_deref(),
            request.password.as_deref(),
            &mut self.rng,
        );
        let host = workload::session_hostname(
            &context.session_name,
            request.hostname.as_deref(),
            request.domain.as_deref(),
        );
        workload::deploy_workload(
            cluster,
            &resources,
            &context,
            credentials,
            host.as_deref(),
            self.options.ingress_class.as_deref(),
        )
    }
}

/// Deploys a session using the thread-local random generator.
pub fn deploy(
    cluster: &dyn ClusterApi,
    budgets: &BudgetTable,
    options: ProvisionOptions,
    request: &DeployRequest,
) -> Result<ConnectionInfo> {
    Provisioner::<ThreadRng>::new(cluster, budgets, options, rand::thread_rng()).provision(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::MemoryCluster;
    use crate::error::Error;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_yaml::Value;

    const LAB: &str = r#"
apiVersion: training.eduk8s.io/v1alpha1
kind: Workshop
metadata:
  name: lab
spec:
  image: quay.io/eduk8s/lab:latest
status:
  enabled: true
"#;

    fn cluster_with(workshop: &str) -> MemoryCluster {
        let cluster = MemoryCluster::new();
        cluster
            .seed(serde_yaml::from_str::<Value>(workshop).unwrap())
            .unwrap();
        cluster
    }

    fn provisioner<'a>(
        cluster: &'a MemoryCluster,
        budgets: &'a BudgetTable,
    ) -> Provisioner<'a, StdRng> {
        Provisioner::new(
            cluster,
            budgets,
            ProvisionOptions::default(),
            StdRng::seed_from_u64(11),
        )
    }

    #[test]
    fn test_successful_deploy_reaches_done() {
        let cluster = cluster_with(LAB);
        let budgets = BudgetTable::embedded().unwrap();
        let mut provisioner = provisioner(&cluster, &budgets);
        let info = provisioner.provision(&DeployRequest::new("lab")).unwrap();

        assert_eq!(provisioner.stage(), Stage::Done);
        assert!(info.session_name.starts_with("lab-"));
        assert_eq!(info.credentials, None);
        let session = cluster.find("Session", None, &info.session_name).unwrap();
        assert_eq!(
            crate::object::owner_uids(&session).len(),
            1,
            "cluster-scoped workshops own their sessions"
        );
    }

    #[test]
    fn test_disabled_workshop_fails_in_validation() {
        let cluster = cluster_with(&LAB.replace("enabled: true", "enabled: false"));
        let budgets = BudgetTable::embedded().unwrap();
        let mut provisioner = provisioner(&cluster, &budgets);
        let err = provisioner.provision(&DeployRequest::new("lab")).unwrap_err();

        assert!(matches!(err, Error::WorkshopDisabled { .. }));
        assert_eq!(provisioner.stage(), Stage::Failed);
        assert!(cluster.created().is_empty());
    }

    #[test]
    fn test_failure_logs_stage() {
        testing_logger::setup();
        let cluster = cluster_with(LAB);
        cluster.inject_conflicts("ServiceAccount", 1);
        let budgets = BudgetTable::embedded().unwrap();
        let mut provisioner = provisioner(&cluster, &budgets);
        let err = provisioner.provision(&DeployRequest::new("lab")).unwrap_err();

        assert!(err.is_conflict());
        testing_logger::validate(|captured_logs| {
            assert!(captured_logs.iter().any(|log| {
                log.level == log::Level::Error
                    && log
                        .body
                        .contains("failed while creating session-owned objects")
            }));
        });
    }

    #[test]
    fn test_generated_password_is_returned() {
        let cluster = cluster_with(LAB);
        let budgets = BudgetTable::embedded().unwrap();
        let mut request = DeployRequest::new("lab");
        request.username = Some("eduk8s".to_string());
        let info = provisioner(&cluster, &budgets).provision(&request).unwrap();

        let credentials = info.credentials.unwrap();
        assert!(credentials.generated);
        assert_eq!(credentials.password.len(), 32);
    }
}
