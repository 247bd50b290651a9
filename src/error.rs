//! # Error Handling
//!
//! This module defines the centralized error type for the `eduk8s` library.
//! It uses `thiserror` to build a single `Error` enum covering every failure
//! the provisioning code can report, with messages suitable for showing to
//! the user as-is.
//!
//! ## Taxonomy
//!
//! - **Not found**: a resource type (`ResourceTypeNotFound`) or a named
//!   instance (`NotFound`) is absent. Fatal, except where a caller explicitly
//!   tolerates it (deleting governance objects that already went away).
//! - **Conflict**: `AlreadyExists`. Only session and session-namespace name
//!   collisions are retried; everywhere else a conflict is fatal.
//! - **Validation**: `WorkshopNotFound`, `WorkshopDisabled`, `InvalidObject`
//!   and `ConfigParse` are reported before anything is mutated.
//! - **Transport**: anything else the cluster returned, propagated unchanged.
//!
//! Use [`Error::is_not_found`] and [`Error::is_conflict`] rather than matching
//! variants when deciding whether to retry or tolerate a failure.

use thiserror::Error;

/// Main error type for eduk8s operations
#[derive(Error, Debug)]
pub enum Error {
    /// The cluster does not serve the requested `(apiVersion, kind)`.
    #[error("The server doesn't have a resource type {api_version}/{kind}.")]
    ResourceTypeNotFound { api_version: String, kind: String },

    /// A named resource instance does not exist.
    #[error("{kind} {name:?} not found{}", namespace.as_ref().map(|ns| format!(" in namespace {:?}", ns)).unwrap_or_default())]
    NotFound {
        kind: String,
        name: String,
        namespace: Option<String>,
    },

    /// A resource with the same name already exists (HTTP 409).
    #[error("{kind} {name:?} already exists{}", namespace.as_ref().map(|ns| format!(" in namespace {:?}", ns)).unwrap_or_default())]
    AlreadyExists {
        kind: String,
        name: String,
        namespace: Option<String>,
    },

    /// The workshop template requested for deployment does not exist.
    #[error("Workshop with name {name:?} does not exist.")]
    WorkshopNotFound { name: String },

    /// The workshop template exists but has not been enabled.
    #[error("Workshop with name {name:?} is not enabled.")]
    WorkshopDisabled { name: String },

    /// No collision-free session name could be found within the retry bound.
    #[error("Failed to create session for workshop {workshop} after {attempts} attempts.")]
    SessionAllocation { workshop: String, attempts: usize },

    /// An object body is missing a field the provisioner depends on.
    #[error("Invalid object: {message}")]
    InvalidObject { message: String },

    /// The settings or budget file could not be parsed.
    ///
    /// Carries an optional hint about how to fix the file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Any other failure reported by the cluster API transport.
    #[error("Cluster API error: {message}")]
    Transport { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON conversion error, wrapped from `serde_json::Error`.
    #[error("JSON conversion error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors that mean "the thing is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::ResourceTypeNotFound { .. }
        )
    }

    /// True for name collisions (HTTP 409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
