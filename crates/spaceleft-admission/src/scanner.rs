//! Host workspace scanner.
//!
//! Lists the workspace directories on a host and attributes each one to the
//! job that owns it. Concurrent builds of one job get disambiguated
//! directories named `<job><combinator><suffix>` (e.g. `myjob@2`); those are
//! mapped back to `myjob` by cutting at the last combinator.

use std::io;
use std::path::PathBuf;

use tracing::debug;

use spaceleft_core::config::{DEFAULT_COMBINATOR, DEFAULT_WORKSPACE_DIR};
use spaceleft_core::{Job, JobLookup, WorkspaceConfig};

use crate::host::Host;

/// A workspace directory found on a host.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidentWorkspace {
    /// Owning job, or `None` when the name matches no known job.
    pub owner: Option<Job>,
    pub directory: PathBuf,
}

/// Scans `<root>/<workspace dir>` on a host.
#[derive(Debug, Clone)]
pub struct WorkspaceScanner {
    combinator: String,
    workspace_dir: String,
}

impl Default for WorkspaceScanner {
    fn default() -> Self {
        Self::new(DEFAULT_COMBINATOR, DEFAULT_WORKSPACE_DIR)
    }
}

impl WorkspaceScanner {
    pub fn new(combinator: impl Into<String>, workspace_dir: impl Into<String>) -> Self {
        Self {
            combinator: combinator.into(),
            workspace_dir: workspace_dir.into(),
        }
    }

    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self::new(config.combinator.clone(), config.dir_name.clone())
    }

    /// Map a workspace directory name to its owning job.
    ///
    /// Tries the name as-is first, then the part before the last combinator.
    pub fn resolve_owner(&self, dir_name: &str, jobs: &dyn JobLookup) -> Option<Job> {
        if let Some(job) = jobs.job(dir_name) {
            return Some(job);
        }
        if self.combinator.is_empty() {
            return None;
        }
        let (base, _suffix) = dir_name.rsplit_once(self.combinator.as_str())?;
        jobs.job(base)
    }

    /// List the workspaces resident on `host`, in directory listing order.
    ///
    /// A host without a resolvable root, or without a workspace directory,
    /// has no workspaces. Errors while listing are returned to the caller.
    pub fn scan(&self, host: &Host, jobs: &dyn JobLookup) -> io::Result<Vec<ResidentWorkspace>> {
        let Some(workspace_root) = host.workspace_root(&self.workspace_dir) else {
            debug!(host = %host.name, "host root unresolved, nothing to scan");
            return Ok(Vec::new());
        };

        let entries = match std::fs::read_dir(&workspace_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(host = %host.name, path = %workspace_root.display(), "no workspace directory");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut resident = Vec::new();
        for entry in entries {
            let entry = entry?;
            let directory = entry.path();
            if !directory.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                debug!(host = %host.name, path = %directory.display(), "skipping non-UTF-8 directory name");
                continue;
            };

            let owner = self.resolve_owner(&name, jobs);
            if owner.is_none() {
                debug!(host = %host.name, dir = %name, "workspace not attributable to any job");
            }
            resident.push(ResidentWorkspace { owner, directory });
        }

        Ok(resident)
    }
}
