//! # Resource Budgets
//!
//! A budget is a named bundle of one `LimitRange` and three `ResourceQuota`
//! objects that caps what a session namespace may consume. The table ships
//! embedded in the binary (`budgets.yaml`) and can be replaced by a file named
//! in the settings file.
//!
//! Two names are reserved and never appear in the table:
//!
//! - `default` leaves whatever governance the namespace already has.
//! - `unlimited` strips existing limits and quotas without replacing them.
//!
//! Any other name that is unknown, or that maps to an empty entry, behaves like
//! `default`.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_yaml::Value;

use crate::defaults::{DEFAULT_BUDGET, UNLIMITED_BUDGET};
use crate::error::{Error, Result};

const EMBEDDED_BUDGETS: &str = include_str!("budgets.yaml");

/// The governance objects making up one budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Budget {
    #[serde(rename = "resource-limits")]
    pub resource_limits: Value,
    #[serde(rename = "compute-resources")]
    pub compute_resources: Value,
    #[serde(rename = "compute-resources-timebound")]
    pub compute_resources_timebound: Value,
    #[serde(rename = "object-counts")]
    pub object_counts: Value,
}

impl Budget {
    /// The three quotas, in creation order.
    pub fn quotas(&self) -> [&Value; 3] {
        [
            &self.compute_resources,
            &self.compute_resources_timebound,
            &self.object_counts,
        ]
    }
}

/// How a budget name resolves against the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    /// Leave existing limits and quotas alone.
    Default,
    /// Remove limits and quotas, create none.
    Unlimited,
    /// Replace limits and quotas with this budget's objects.
    Limited(&'a Budget),
}

/// Immutable mapping from budget name to its governance objects.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetTable {
    budgets: BTreeMap<String, Option<Budget>>,
}

impl BudgetTable {
    /// The table compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_BUDGETS)
    }

    /// Parses a table from YAML text.
    pub fn parse(yaml: &str) -> Result<Self> {
        let budgets: BTreeMap<String, Option<Budget>> =
            serde_yaml::from_str(yaml).map_err(|err| Error::ConfigParse {
                message: format!("invalid budget table: {}", err),
                hint: Some(
                    "Each budget needs resource-limits, compute-resources, \
                     compute-resources-timebound and object-counts"
                        .to_string(),
                ),
            })?;

        for reserved in [DEFAULT_BUDGET, UNLIMITED_BUDGET] {
            if budgets.contains_key(reserved) {
                return Err(Error::ConfigParse {
                    message: format!("budget table defines reserved budget {:?}", reserved),
                    hint: Some(format!(
                        "Remove the {:?} entry; it is built in",
                        reserved
                    )),
                });
            }
        }

        Ok(Self { budgets })
    }

    /// Loads a table from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::parse(&content)
    }

    /// Budget names defined in the table, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.budgets.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Budget> {
        self.budgets.get(name).and_then(Option::as_ref)
    }

    /// Resolves a requested budget name.
    ///
    /// Names missing from the table, and names whose entry is empty, fall
    /// back to [`Selection::Default`].
    pub fn select(&self, name: &str) -> Selection<'_> {
        if name == UNLIMITED_BUDGET {
            return Selection::Unlimited;
        }
        match self.get(name) {
            Some(budget) => Selection::Limited(budget),
            None => {
                if name != DEFAULT_BUDGET {
                    debug!("budget {:?} is not defined, using default", name);
                }
                Selection::Default
            }
        }
    }
}
