//! Admission decision: the hook a build queue consults before placing a job.
//!
//! For a `(host, job)` candidate the dispatcher measures the host's usable
//! space once, subtracts the candidate's own requirement and the
//! requirements of every other job with a workspace on the host, and vetoes
//! the placement when nothing is left. Nothing here fails: every error
//! degrades to "no space available" or "nothing required" and is logged.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use spaceleft_core::{JobLookup, SpaceLeftConfig};

use crate::aggregator::RequiredSpaceAggregator;
use crate::free_space::{FreeSpace, FsSpaceProbe, SpaceProbe, usable_space};
use crate::host::{Host, supports_space_accounting};
use crate::scanner::WorkspaceScanner;

/// Queue item parameter carrying an explicit space requirement in bytes.
pub const REQUIRED_SPACE_PARAMETER: &str = "REQUIRED_SPACE";

/// A queued build waiting for a host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuildableItem {
    pub job_name: String,
    pub parameters: HashMap<String, String>,
}

impl BuildableItem {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// A candidate placement to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    pub host: Host,
    pub job_name: String,
    /// Replaces the candidate's configured requirement when present.
    pub explicit_space_override: Option<u64>,
}

/// Why a placement was vetoed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    NotEnoughFreeDiskSpace { host: String },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::NotEnoughFreeDiskSpace { host } => {
                write!(f, "insufficient free disk space on {host}")
            }
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionResult {
    pub allowed: bool,
    /// Projected bytes left after placement, never negative. `u64::MAX` for
    /// hosts that aren't accounted.
    pub remaining_space_bytes: u64,
    /// Operator-facing explanation when the placement is vetoed.
    pub block_reason: Option<String>,
}

impl AdmissionResult {
    fn unaccounted() -> Self {
        Self {
            allowed: true,
            remaining_space_bytes: u64::MAX,
            block_reason: None,
        }
    }

    fn from_remaining(host: &Host, remaining_space_bytes: u64) -> Self {
        let allowed = remaining_space_bytes > 0;
        Self {
            allowed,
            remaining_space_bytes,
            block_reason: (!allowed).then(|| {
                BlockReason::NotEnoughFreeDiskSpace {
                    host: host.name.clone(),
                }
                .to_string()
            }),
        }
    }
}

/// Disk space admission check for build placements.
///
/// Stateless: every call re-reads the host. Cheap to clone and safe to share
/// across the scheduler's threads.
#[derive(Clone)]
pub struct SpaceLeftDispatcher {
    jobs: Arc<dyn JobLookup>,
    probe: Arc<dyn SpaceProbe>,
    aggregator: RequiredSpaceAggregator,
}

impl SpaceLeftDispatcher {
    /// Create a dispatcher using the real filesystem and default workspace layout.
    pub fn new(jobs: Arc<dyn JobLookup>) -> Self {
        Self {
            jobs,
            probe: Arc::new(FsSpaceProbe),
            aggregator: RequiredSpaceAggregator::default(),
        }
    }

    /// Create a dispatcher whose jobs and workspace layout come from `config`.
    pub fn from_config(config: &SpaceLeftConfig) -> Self {
        Self::new(Arc::new(config.job_catalog()))
            .with_scanner(WorkspaceScanner::from_config(&config.workspace))
    }

    /// Replace the free space probe.
    pub fn with_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the workspace scanner (combinator and workspace dir name).
    pub fn with_scanner(mut self, scanner: WorkspaceScanner) -> Self {
        self.aggregator = RequiredSpaceAggregator::new(scanner);
        self
    }

    pub fn aggregator(&self) -> &RequiredSpaceAggregator {
        &self.aggregator
    }

    /// Usable space on `host` as this dispatcher measures it.
    pub fn free_space(&self, host: &Host) -> FreeSpace {
        usable_space(host, self.probe.as_ref())
    }

    /// Decide whether `request.job_name` may run on `request.host`.
    pub fn decide(&self, request: &PlacementRequest) -> AdmissionResult {
        let host = &request.host;
        if !supports_space_accounting(host) {
            debug!(host = %host.name, "host not space-accounted, admitting");
            return AdmissionResult::unaccounted();
        }

        info!(host = %host.name, job = %request.job_name, "checking disk usage on host");

        let space_needed = match request.explicit_space_override {
            Some(bytes) => bytes,
            None => self.jobs.space_needed(&request.job_name),
        };

        let free = self.free_space(host);
        let mut remaining = free.bytes().saturating_sub(space_needed);
        if remaining > 0 {
            remaining = self.aggregator.consume(
                host,
                self.jobs.as_ref(),
                Some(request.job_name.as_str()),
                remaining,
            );
        }

        debug!(
            host = %host.name,
            job = %request.job_name,
            ?free,
            space_needed,
            remaining,
            "disk space accounted"
        );

        let result = AdmissionResult::from_remaining(host, remaining);
        if result.allowed {
            info!(host = %host.name, job = %request.job_name, remaining, "detected enough free disk space for job");
        } else {
            warn!(host = %host.name, job = %request.job_name, "host has not enough free disk space");
        }
        result
    }

    /// Queue hook: evaluate `item` for placement on `host`.
    ///
    /// Reads the optional `REQUIRED_SPACE` item parameter as an override.
    pub fn can_take(&self, host: &Host, item: &BuildableItem) -> AdmissionResult {
        let request = PlacementRequest {
            host: host.clone(),
            job_name: item.job_name.clone(),
            explicit_space_override: parse_required_space(&item.parameters),
        };
        self.decide(&request)
    }

    /// [`can_take`](Self::can_take) on the blocking thread pool, for async schedulers.
    ///
    /// A check that can't complete denies the placement.
    pub async fn can_take_async(&self, host: Host, item: BuildableItem) -> AdmissionResult {
        let dispatcher = self.clone();
        let host_name = host.name.clone();
        match tokio::task::spawn_blocking(move || dispatcher.can_take(&host, &item)).await {
            Ok(result) => result,
            Err(e) => {
                error!(host = %host_name, error = %e, "admission check did not complete");
                AdmissionResult {
                    allowed: false,
                    remaining_space_bytes: 0,
                    block_reason: Some(
                        BlockReason::NotEnoughFreeDiskSpace { host: host_name }.to_string(),
                    ),
                }
            }
        }
    }
}

/// Parse the `REQUIRED_SPACE` parameter as a base-10 byte count.
///
/// Unparsable or negative values are logged and treated as absent.
pub fn parse_required_space(parameters: &HashMap<String, String>) -> Option<u64> {
    let raw = parameters.get(REQUIRED_SPACE_PARAMETER)?;
    match raw.parse::<i64>() {
        Ok(bytes) if bytes >= 0 => Some(bytes as u64),
        Ok(bytes) => {
            debug!(value = bytes, "negative required space ignored");
            None
        }
        Err(e) => {
            warn!(value = %raw, error = %e, "error parsing required space");
            None
        }
    }
}
