//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `eduk8s`
//! command-line tool. Each subcommand group is defined in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Settings are loaded before a cluster connection is attempted, so a broken
//! settings file is reported without touching the cluster.

pub mod completions;
pub mod session;
pub mod workshop;

use std::path::PathBuf;

use anyhow::Result;

use eduk8s::cluster::kubernetes::KubeCluster;
use eduk8s::config::Settings;
use eduk8s::suggestions;

/// Flags shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub color: String,
}

impl GlobalArgs {
    /// Loads the settings file named by `--config`, or the default one.
    pub fn settings(&self) -> Result<Settings> {
        if let Some(path) = &self.config {
            if !path.exists() {
                return Err(suggestions::config_not_found(path));
            }
        }
        Settings::load(self.config.as_deref()).map_err(suggestions::explain)
    }
}

/// Connects to the cluster named by the current kubeconfig context.
pub fn connect() -> Result<KubeCluster> {
    KubeCluster::connect().map_err(suggestions::explain)
}

/// Namespace to look workshops up in: the flag, else the settings file, else
/// `default`.
pub fn namespace(flag: Option<String>, settings: &Settings) -> String {
    flag.or_else(|| settings.namespace.clone())
        .unwrap_or_else(|| eduk8s::defaults::DEFAULT_NAMESPACE.to_string())
}
