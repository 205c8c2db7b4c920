//! Required-space aggregation over the workspaces resident on a host.
//!
//! Every workspace directory owned by a known job is charged that job's
//! space requirement, once per directory: a job with three concurrent-build
//! workspaces is charged three times. The job being placed is excluded by
//! name, which drops all of its directories at once.

use tracing::{debug, warn};

use spaceleft_core::JobLookup;

use crate::host::Host;
use crate::scanner::{ResidentWorkspace, WorkspaceScanner};

#[derive(Debug, Clone, Default)]
pub struct RequiredSpaceAggregator {
    scanner: WorkspaceScanner,
}

impl RequiredSpaceAggregator {
    pub fn new(scanner: WorkspaceScanner) -> Self {
        Self { scanner }
    }

    /// Total bytes required by the workspaces on `host`, except those of `exclude`.
    ///
    /// Saturates at `u64::MAX`.
    pub fn aggregate(&self, host: &Host, jobs: &dyn JobLookup, exclude: Option<&str>) -> u64 {
        let workspaces = self.resident(host, jobs);
        charges(&workspaces, exclude).fold(0u64, |total, (_, bytes)| total.saturating_add(bytes))
    }

    /// Subtract the workspace charges on `host` from `available`.
    ///
    /// Stops at the first charge that exhausts the budget and returns 0;
    /// otherwise returns what is left.
    pub fn consume(
        &self,
        host: &Host,
        jobs: &dyn JobLookup,
        exclude: Option<&str>,
        available: u64,
    ) -> u64 {
        if available == 0 {
            return 0;
        }

        let workspaces = self.resident(host, jobs);
        let mut remaining = available;
        for (job, bytes) in charges(&workspaces, exclude) {
            remaining = remaining.saturating_sub(bytes);
            if remaining == 0 {
                debug!(host = %host.name, job = %job, "space budget exhausted");
                break;
            }
        }
        remaining
    }

    fn resident(&self, host: &Host, jobs: &dyn JobLookup) -> Vec<ResidentWorkspace> {
        match self.scanner.scan(host, jobs) {
            Ok(workspaces) => workspaces,
            Err(e) => {
                warn!(host = %host.name, error = %e, "workspace scan failed, counting no required space");
                Vec::new()
            }
        }
    }
}

/// `(job name, bytes)` for every attributable workspace not owned by `exclude`.
fn charges<'a>(
    workspaces: &'a [ResidentWorkspace],
    exclude: Option<&'a str>,
) -> impl Iterator<Item = (&'a str, u64)> + 'a {
    workspaces
        .iter()
        .filter_map(|w| w.owner.as_ref())
        .filter(move |job| exclude != Some(job.name.as_str()))
        .map(|job| (job.name.as_str(), job.space_needed()))
}
