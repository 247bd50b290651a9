//! Default values for eduk8s.
//!
//! This module provides centralized default values and well-known names used
//! across the provisioner and the CLI, ensuring consistency and avoiding
//! duplication.

use std::path::PathBuf;

/// API version of the Workshop and Session custom resources.
pub const TRAINING_API_VERSION: &str = "training.eduk8s.io/v1alpha1";

/// API group of the Workshop and Session custom resources.
pub const TRAINING_API_GROUP: &str = "training.eduk8s.io";

/// Namespace used to look up workshops when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Cluster role bound into session namespaces when a workshop names none.
pub const DEFAULT_ROLE: &str = "admin";

/// Budget name meaning "leave existing quotas and limits alone".
pub const DEFAULT_BUDGET: &str = "default";

/// Budget name meaning "strip quotas and limits without replacing them".
pub const UNLIMITED_BUDGET: &str = "unlimited";

/// How many times a conflicting session name is retried before giving up.
pub const DEFAULT_SESSION_RETRIES: usize = 10;

/// Port the workshop container listens on.
pub const WORKSHOP_PORT: i32 = 10080;

/// Length of the random session token.
pub const SESSION_TOKEN_LENGTH: usize = 5;

/// Alphabet for session tokens. No vowels, so tokens never spell words.
pub const SESSION_TOKEN_ALPHABET: &str = "bcdfghjklmnpqrstvwxyz0123456789";

/// Length of generated workshop passwords.
pub const PASSWORD_LENGTH: usize = 32;

/// Alphabet for generated workshop passwords.
pub const PASSWORD_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#%+-.:=?@_~";

/// Annotation on a template-created Namespace selecting its cluster role.
pub const ROLE_ANNOTATION: &str = "session/role";

/// Annotation on a template-created Namespace selecting its budget.
pub const BUDGET_ANNOTATION: &str = "session/budget";

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "EDUK8S_CONFIG";

/// Returns the default settings file location.
///
/// Uses the platform-appropriate configuration directory:
/// - Linux: `~/.config/eduk8s/config.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/eduk8s/config.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\eduk8s\config.yaml`
///
/// Falls back to `.eduk8s.yaml` in the current directory if the platform
/// configuration directory cannot be determined.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("eduk8s").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from(".eduk8s.yaml"))
}
