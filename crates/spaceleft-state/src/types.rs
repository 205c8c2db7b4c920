//! Persisted build history types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build parameter holding the measured workspace size in bytes.
pub const WORKSPACE_SIZE_PARAM: &str = "workspaceSize";

/// One build of a job and the string parameters recorded for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildRecord {
    pub job: String,
    pub number: u64,
    pub parameters: BTreeMap<String, String>,
    /// Unix timestamp (seconds) when the record was first written.
    pub recorded_at: u64,
}

impl BuildRecord {
    pub fn new(job: impl Into<String>, number: u64) -> Self {
        Self {
            job: job.into(),
            number,
            parameters: BTreeMap::new(),
            recorded_at: epoch_secs(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Build the composite key for the builds table.
    pub fn table_key(&self) -> String {
        build_key(&self.job, self.number)
    }
}

/// Composite key for a build of `job`.
pub fn build_key(job: &str, number: u64) -> String {
    format!("{job}:{number:020}")
}

/// Key prefix shared by every build of `job`.
pub fn build_prefix(job: &str) -> String {
    format!("{job}:")
}

pub(crate) fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
