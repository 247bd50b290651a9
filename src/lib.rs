//! # eduk8s Library
//!
//! This library provisions and tears down workshop sessions on a Kubernetes
//! cluster. It is designed to be used by the `eduk8s` command-line tool, but
//! the provisioning logic only depends on the [`cluster::ClusterApi`] trait and
//! can be driven against any implementation of it.
//!
//! ## Quick Example
//!
//! ```
//! use eduk8s::budget::BudgetTable;
//! use eduk8s::cluster::memory::MemoryCluster;
//! use eduk8s::phases::orchestrator::{deploy, DeployRequest, ProvisionOptions};
//!
//! let cluster = MemoryCluster::new();
//! cluster
//!     .seed(
//!         serde_yaml::from_str(
//!             "apiVersion: training.eduk8s.io/v1alpha1\n\
//!              kind: Workshop\n\
//!              metadata:\n  name: lab\n\
//!              spec:\n  image: quay.io/eduk8s/lab:latest\n\
//!              status:\n  enabled: true\n",
//!         )
//!         .unwrap(),
//!     )
//!     .unwrap();
//!
//! let budgets = BudgetTable::embedded().unwrap();
//! let info = deploy(
//!     &cluster,
//!     &budgets,
//!     ProvisionOptions::default(),
//!     &DeployRequest::new("lab"),
//! )
//! .unwrap();
//! assert!(info.session_name.starts_with("lab-"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Workshops (`workshop`)**: templates describing the workshop image and
//!   the objects every session gets.
//! - **Sessions (`session`)**: one provisioned instance of a workshop. The
//!   Session object owns everything created for it.
//! - **Budgets (`budget`)**: named limit range and quota bundles applied to
//!   session namespaces.
//! - **Substitution (`substitute`)** and **overlay merge (`merge`)**: the two
//!   tree transformations applied to template objects and pod patches.
//! - **Cluster (`cluster`)**: the trait every cluster access goes through, a
//!   `kube`-backed implementation and an in-memory one for tests.
//!
//! ## Execution Flow
//!
//! `phases::orchestrator` runs a deploy through these stages:
//!
//! 1.  **Validation**: The workshop exists and is enabled and every resource
//!     type is served. Nothing is created before this passes.
//! 2.  **Identity**: A Session named `{workshop}-{token}` and its namespace are
//!     created, retrying on name conflicts.
//! 3.  **Session objects**: Service account and console role binding.
//! 4.  **Governance**: Role binding and budget in the session namespace.
//! 5.  **Template objects**: The workshop's objects, in order, with any
//!     created namespaces governed in turn.
//! 6.  **Workload**: Workshop deployment, service and optional ingress.

pub mod budget;
pub mod cluster;
pub mod config;
pub mod defaults;
pub mod error;
pub mod merge;
pub mod object;
pub mod output;
pub mod phases;
pub mod session;
pub mod substitute;
pub mod suggestions;
pub mod workshop;

#[cfg(test)]
mod substitute_proptest;
