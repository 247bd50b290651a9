//! # Variable Substitution
//!
//! Workshop templates refer to per-session values with `$(name)` tokens
//! anywhere a string appears: `$(session_namespace)`, `$(user_id)` and so on.
//! [`substitute`] walks an object tree and expands those tokens in every
//! string value, returning a new tree.
//!
//! Bindings are applied one after another, in insertion order, each replacing
//! every occurrence of its token. Tokens without a binding are left verbatim.
//! Mapping keys are never rewritten.

use std::sync::LazyLock;

use log::{debug, log_enabled, Level};
use regex::Regex;
use serde_yaml::{Mapping, Value};

/// Ordered set of `name -> value` substitutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    entries: Vec<(String, String)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a binding. A replaced binding keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Expands every bound token in `text`.
pub fn substitute_str(text: &str, bindings: &Bindings) -> String {
    if !text.contains("$(") {
        return text.to_string();
    }
    let mut result = text.to_string();
    for (name, value) in bindings.iter() {
        let token = format!("$({})", name);
        if result.contains(&token) {
            result = result.replace(&token, value);
        }
    }
    if log_enabled!(Level::Debug) {
        for token in unbound_tokens(&result) {
            debug!("leaving unbound variable {} in {:?}", token, result);
        }
    }
    result
}

/// Returns a copy of `tree` with every string value expanded.
pub fn substitute(tree: &Value, bindings: &Bindings) -> Value {
    match tree {
        Value::String(text) => Value::String(substitute_str(text, bindings)),
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|item| substitute(item, bindings))
                .collect(),
        ),
        Value::Mapping(map) => {
            let mut expanded = Mapping::with_capacity(map.len());
            for (key, value) in map {
                expanded.insert(key.clone(), substitute(value, bindings));
            }
            Value::Mapping(expanded)
        }
        Value::Tagged(tagged) => {
            let mut tagged = tagged.clone();
            tagged.value = substitute(&tagged.value, bindings);
            Value::Tagged(tagged)
        }
        other => other.clone(),
    }
}

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\([A-Za-z_][A-Za-z0-9_]*\)").expect("token pattern is valid")
});

/// `$(name)` tokens still present in `text`.
pub fn unbound_tokens(text: &str) -> Vec<&str> {
    TOKEN.find_iter(text).map(|m| m.as_str()).collect()
}
