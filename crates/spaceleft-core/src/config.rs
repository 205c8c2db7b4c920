//! spaceleft.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::types::{Job, JobCatalog, JobSettings};

/// Token separating a job name from the suffix of a concurrent-build workspace.
pub const DEFAULT_COMBINATOR: &str = "@";

/// Directory under a host's root that holds job workspaces.
pub const DEFAULT_WORKSPACE_DIR: &str = "workspace";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceLeftConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Per-job settings keyed by job name.
    #[serde(default)]
    pub jobs: HashMap<String, JobSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_combinator")]
    pub combinator: String,
    #[serde(default = "default_dir_name")]
    pub dir_name: String,
}

fn default_combinator() -> String {
    DEFAULT_COMBINATOR.to_string()
}

fn default_dir_name() -> String {
    DEFAULT_WORKSPACE_DIR.to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            combinator: default_combinator(),
            dir_name: default_dir_name(),
        }
    }
}

impl SpaceLeftConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: SpaceLeftConfig = toml::from_str(content)?;
        if config.workspace.combinator.is_empty() {
            anyhow::bail!("workspace.combinator must not be empty");
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build an in-memory registry from the configured jobs.
    pub fn job_catalog(&self) -> JobCatalog {
        let mut catalog = JobCatalog::new();
        for (name, settings) in &self.jobs {
            let mut job = Job::new(name.clone());
            job.space = settings.requirement();
            catalog.insert(job);
        }
        catalog
    }
}
