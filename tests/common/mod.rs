//! Shared test utilities for integration and E2E tests.
//!
//! This module provides workshop fixtures, a helper for seeding them into an
//! in-memory cluster, and a temporary-directory fixture for CLI tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let cluster = cluster_with(&[workshops::LAB]);
//!     // ... test code
//! }
//! ```

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use eduk8s::cluster::memory::MemoryCluster;
use serde_yaml::Value;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{cluster_with, workshops, TestFixture};
}

/// Workshop documents used across tests.
#[allow(dead_code)]
pub mod workshops {
    /// Enabled workshop with no session objects.
    pub const LAB: &str = r#"
apiVersion: training.eduk8s.io/v1alpha1
kind: Workshop
metadata:
  name: lab
spec:
  vendor: eduk8s.io
  title: Lab
  description: A plain lab
  url: https://github.com/eduk8s/lab
  image: quay.io/eduk8s/lab:latest
  duration: 1h
status:
  enabled: true
"#;

    /// Enabled workshop exercising every template feature.
    pub const FULL: &str = r#"
apiVersion: training.eduk8s.io/v1alpha1
kind: Workshop
metadata:
  name: full
spec:
  title: Full
  image: quay.io/eduk8s/full:latest
  session:
    role: edit
    budget: small
    objects:
      - apiVersion: v1
        kind: Namespace
        metadata:
          name: $(session_namespace)-build
          annotations:
            session/role: view
            session/budget: unlimited
      - apiVersion: v1
        kind: ConfigMap
        metadata:
          name: settings
        data:
          owner: $(service_account)
          workshop: $(workshop_name)/$(workshop_uid)
      - apiVersion: v1
        kind: Secret
        metadata:
          name: $(session_name)-token
          namespace: $(workshop_namespace)
      - apiVersion: v1
        kind: ConfigMap
        metadata:
          name: build-settings
          namespace: $(session_namespace)-build
      - apiVersion: rbac.authorization.k8s.io/v1
        kind: ClusterRole
        metadata:
          name: $(session_name)-extra
        rules: []
    patches:
      containers:
        - name: workshop
          env:
            - name: BUILD_NAMESPACE
              value: $(session_namespace)-build
status:
  enabled: true
"#;

    /// Workshop that has not been enabled.
    pub const DISABLED: &str = r#"
apiVersion: training.eduk8s.io/v1alpha1
kind: Workshop
metadata:
  name: draft
spec:
  image: quay.io/eduk8s/draft:latest
"#;
}

/// Parses a YAML document.
#[allow(dead_code)]
pub fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).expect("fixture is valid YAML")
}

/// An in-memory cluster holding the given workshops.
#[allow(dead_code)]
pub fn cluster_with(documents: &[&str]) -> MemoryCluster {
    let cluster = MemoryCluster::new();
    for document in documents {
        cluster.seed(yaml(document)).expect("fixture seeds cleanly");
    }
    cluster
}

/// A temporary directory for CLI tests.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a settings file with the given content.
    pub fn with_settings(self, content: &str) -> Self {
        self.with_file("config.yaml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.temp_dir.path().join("config.yaml")
    }

    /// A command for the eduk8s binary with no ambient settings.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("eduk8s");
        cmd.current_dir(self.path())
            .env_remove("EDUK8S_CONFIG")
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("xdg"))
            .env("KUBECONFIG", self.path().join("no-kubeconfig"));
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
