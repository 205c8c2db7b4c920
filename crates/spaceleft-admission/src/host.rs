//! Execution hosts as the admission check sees them.

use std::path::{Path, PathBuf};

/// Role of a host in the build farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// The always-available primary node. Its capacity is assumed sufficient.
    Primary,
    /// A remote agent whose disk is shared by every job placed on it.
    Agent,
}

/// Snapshot of an execution host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub kind: HostKind,
    /// Root directory of the host. `None` when it can't be resolved,
    /// e.g. the agent is offline.
    pub root: Option<PathBuf>,
}

impl Host {
    pub fn agent(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: HostKind::Agent,
            root: Some(root.into()),
        }
    }

    /// An agent whose root path could not be resolved.
    pub fn offline_agent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: HostKind::Agent,
            root: None,
        }
    }

    pub fn primary(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: HostKind::Primary,
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Directory holding job workspaces on this host.
    pub fn workspace_root(&self, dir_name: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(dir_name))
    }
}

/// Whether placements on `host` go through disk space accounting.
///
/// Only agents are accounted; the primary node always admits.
pub fn supports_space_accounting(host: &Host) -> bool {
    matches!(host.kind, HostKind::Agent)
}
