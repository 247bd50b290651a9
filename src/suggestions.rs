//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Errors should tell users what went
//! wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::suggestions;
//!
//! // Instead of:
//! provision(&cluster, &request)?;
//!
//! // Use:
//! provision(&cluster, &request).map_err(suggestions::explain)?;
//! ```

use std::path::Path;

use crate::defaults::{CONFIG_ENV, TRAINING_API_GROUP};
use crate::error::Error;

/// Generate an error for when an explicitly named settings file is missing.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Settings file not found: {path}\n\n\
         hint: Use --config to point at a different file\n\
         hint: Unset the {env} environment variable to use the default location",
        path = path.display(),
        env = CONFIG_ENV
    )
}

/// Attach hints to a library error.
///
/// Errors without a known remedy are passed through unchanged.
pub fn explain(error: Error) -> anyhow::Error {
    let hints = match &error {
        Error::WorkshopNotFound { name } => Some(format!(
            "hint: Run 'eduk8s workshop list' to see available workshops\n\
             hint: Import it with 'eduk8s workshop import -f <FILE> --name {name}'"
        )),
        Error::WorkshopDisabled { name } => Some(format!(
            "hint: Run 'eduk8s workshop enable {name}' first"
        )),
        Error::ResourceTypeNotFound { api_version, .. }
            if api_version.starts_with(TRAINING_API_GROUP) =>
        {
            Some(format!(
                "hint: Install the {TRAINING_API_GROUP} custom resource definitions on the cluster"
            ))
        }
        Error::SessionAllocation { .. } => Some(
            "hint: Delete stale namespaces left behind by earlier sessions\n\
             hint: Raise 'session-retries' in the settings file"
                .to_string(),
        ),
        Error::Transport { .. } => Some(
            "hint: Check that the current kubeconfig context points at a reachable cluster"
                .to_string(),
        ),
        _ => None,
    };
    match hints {
        Some(hints) => anyhow::anyhow!("{error}\n\n{hints}"),
        None => anyhow::Error::new(error),
    }
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
pub(crate) fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (a_len, b_len) = (a_chars.len(), b_chars.len());

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut previous: Vec<usize> = (0..=b_len).collect();
    let mut current = vec![0usize; b_len + 1];
    for i in 1..=a_len {
        current[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_len]
}
