//! # Settings File
//!
//! Optional YAML file tuning the provisioner. Every field may be omitted:
//!
//! ```yaml
//! namespace: workshops          # namespace workshops are looked up in
//! session-retries: 20           # retries after a session name conflict
//! budgets: ./budgets.yaml       # replaces the built-in budget table
//! ingress-class: nginx          # ingressClassName for session ingresses
//! default-role: edit            # role when a workshop names none
//! ```
//!
//! The file is found through `--config`, then the `EDUK8S_CONFIG` environment
//! variable, then the platform configuration directory. Command line flags
//! override values from the file. Unknown keys are rejected with a hint.
//!
//! A relative `budgets` path is resolved against the directory holding the
//! settings file.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::budget::BudgetTable;
use crate::defaults::{default_config_path, DEFAULT_ROLE, DEFAULT_SESSION_RETRIES};
use crate::error::{Error, Result};
use crate::suggestions::find_similar;

const FIELDS: &[&str] = &[
    "namespace",
    "session-retries",
    "budgets",
    "ingress-class",
    "default-role",
];

/// Parsed settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// Namespace workshops are looked up in when `--namespace` is not given.
    pub namespace: Option<String>,
    /// How many times a conflicting session name is retried.
    pub session_retries: Option<usize>,
    /// Budget table replacing the built-in one.
    pub budgets: Option<PathBuf>,
    /// `ingressClassName` set on session ingresses.
    pub ingress_class: Option<String>,
    /// Cluster role bound when a workshop does not name one.
    pub default_role: Option<String>,
    /// Directory of the file these settings came from.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Settings {
    /// Parses settings from YAML text. Empty text yields the defaults.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(describe_parse_error)
    }

    /// Reads settings from a file that must exist.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut settings = Self::parse(&content).map_err(|err| match err {
            Error::ConfigParse { message, hint } => Error::ConfigParse {
                message: format!("{}: {}", path.display(), message),
                hint,
            },
            other => other,
        })?;
        settings.base_dir = path.parent().map(Path::to_path_buf);
        Ok(settings)
    }

    /// Loads the settings file named explicitly, or the default one if it
    /// exists, or falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!("loading settings from {}", path.display());
            return Self::from_file(path);
        }
        let path = default_config_path();
        if path.is_file() {
            debug!("loading settings from {}", path.display());
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn session_retries(&self) -> usize {
        self.session_retries.unwrap_or(DEFAULT_SESSION_RETRIES)
    }

    pub fn default_role(&self) -> &str {
        self.default_role.as_deref().unwrap_or(DEFAULT_ROLE)
    }

    /// Path of the configured budget table, resolved against the settings
    /// file's directory.
    pub fn budgets_path(&self) -> Option<PathBuf> {
        let budgets = self.budgets.as_ref()?;
        Some(match &self.base_dir {
            Some(dir) if budgets.is_relative() => dir.join(budgets),
            _ => budgets.clone(),
        })
    }

    /// The budget table to provision with.
    pub fn budget_table(&self) -> Result<BudgetTable> {
        match self.budgets_path() {
            Some(path) => {
                debug!("loading budget table from {}", path.display());
                BudgetTable::from_file(path)
            }
            None => BudgetTable::embedded(),
        }
    }
}

/// Turns a serde error into a `ConfigParse` error, suggesting the closest
/// known key for an unknown one.
fn describe_parse_error(err: serde_yaml::Error) -> Error {
    let message = err.to_string();
    let hint = unknown_field(&message).map(|field| match find_similar(field, FIELDS) {
        Some(known) => format!("Did you mean '{}'?", known),
        None => format!("Valid keys are: {}", FIELDS.join(", ")),
    });
    Error::ConfigParse { message, hint }
}

/// Extracts the key name from serde's "unknown field `x`" message.
fn unknown_field(message: &str) -> Option<&str> {
    let rest = message.split_once("unknown field `")?.1;
    rest.split_once('`').map(|(field, _)| field)
}
