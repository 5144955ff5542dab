//! Feature probes: SQL checks run against a fresh PostgreSQL database.

pub mod catalog;
pub mod check;
pub mod runner;
pub mod value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::InitScript;

pub use catalog::{builtin_probes, load_probes, select_probes};
pub use runner::ProbeRunner;

/// What a check's query must return
///
/// Values are compared against the first column of each row in its
/// PostgreSQL text representation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    /// The first row's value equals `value`
    Scalar { value: String },
    /// The first row's value is a boolean (or number) with this truth value
    Truthy { value: bool },
    /// Every listed value appears among the returned rows
    ContainsRows { values: Vec<String> },
    /// The returned rows are exactly these values, in order
    ExactRows { values: Vec<String> },
    /// The first row's value is an hstore with these pairs and without these keys
    Hstore {
        #[serde(default)]
        contains: BTreeMap<String, String>,
        #[serde(default)]
        absent: Vec<String>,
    },
    /// The query returns no rows
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Check {
    pub query: String,
    pub expect: Expectation,
}

impl Check {
    pub fn new(query: &str, expect: Expectation) -> Self {
        Self {
            query: query.to_string(),
            expect,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Probe {
    pub name: String,
    pub description: String,
    pub init_script: Option<InitScript>,
    pub checks: Vec<Check>,
}
