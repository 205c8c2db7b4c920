//! Shared types used across spaceleft crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Factor applied when none is configured or the configured one is below parity.
pub const DEFAULT_FACTOR: f64 = 1.0;

/// Storage a job is expected to consume on the host that runs it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceRequirement {
    /// Last known footprint of the job's workspace, in bytes.
    pub required_space: u64,
    /// Safety multiplier on top of `required_space`.
    pub factor: f64,
}

impl SpaceRequirement {
    pub fn new(required_space: u64, factor: f64) -> Self {
        Self {
            required_space,
            factor,
        }
    }

    /// Effective factor. Anything below 1.0 (including NaN) counts as 1.0.
    pub fn factor(&self) -> f64 {
        if self.factor >= DEFAULT_FACTOR {
            self.factor
        } else {
            DEFAULT_FACTOR
        }
    }

    /// Bytes to reserve for this job, truncated toward zero.
    ///
    /// `100 * 1.23` yields 123 and `1 * 1.23` yields 1. Products beyond
    /// `u64::MAX` saturate.
    pub fn space_needed(&self) -> u64 {
        (self.required_space as f64 * self.factor()) as u64
    }
}

impl Default for SpaceRequirement {
    fn default() -> Self {
        Self::new(0, DEFAULT_FACTOR)
    }
}

/// Per-job space settings as an operator configures them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub use_required_space: bool,
    #[serde(default)]
    pub required_space: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_factor() -> f64 {
    DEFAULT_FACTOR
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            use_required_space: false,
            required_space: 0,
            factor: DEFAULT_FACTOR,
        }
    }
}

impl JobSettings {
    /// Settings with the requirement switched on.
    pub fn enabled(required_space: u64, factor: f64) -> Self {
        Self {
            use_required_space: true,
            required_space,
            factor,
        }
    }

    /// The requirement these settings declare, if the switch is on.
    pub fn requirement(&self) -> Option<SpaceRequirement> {
        self.use_required_space
            .then(|| SpaceRequirement::new(self.required_space, self.factor))
    }
}

/// A named unit of work known to the build system.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub space: Option<SpaceRequirement>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            space: None,
        }
    }

    pub fn with_required_space(mut self, required_space: u64) -> Self {
        self.space = Some(SpaceRequirement::new(required_space, DEFAULT_FACTOR));
        self
    }

    pub fn with_requirement(mut self, requirement: SpaceRequirement) -> Self {
        self.space = Some(requirement);
        self
    }

    /// Bytes to reserve for this job; 0 when no requirement is declared.
    pub fn space_needed(&self) -> u64 {
        self.space.map_or(0, |s| s.space_needed())
    }
}

/// Name-based job lookup, backed by whatever registry the build system keeps.
pub trait JobLookup: Send + Sync {
    /// Find a job by its exact name.
    fn job(&self, name: &str) -> Option<Job>;

    /// Bytes to reserve for the named job; 0 for unknown jobs.
    fn space_needed(&self, name: &str) -> u64 {
        self.job(name).map_or(0, |job| job.space_needed())
    }
}

/// In-memory job registry.
#[derive(Debug, Clone, Default)]
pub struct JobCatalog {
    jobs: HashMap<String, Job>,
}

impl JobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job.
    pub fn insert(&mut self, job: Job) {
        self.jobs.insert(job.name.clone(), job);
    }

    pub fn with_job(mut self, job: Job) -> Self {
        self.insert(job);
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobLookup for JobCatalog {
    fn job(&self, name: &str) -> Option<Job> {
        self.jobs.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_needed_truncates_factor_product() {
        let mut req = SpaceRequirement::new(1, 1.23);
        assert_eq!(req.space_needed(), 1);

        req.required_space = 100;
        assert_eq!(req.space_needed(), 123);
    }

    #[test]
    fn factor_below_parity_is_floored() {
        assert_eq!(SpaceRequirement::new(500, 0.0).space_needed(), 500);
        assert_eq!(SpaceRequirement::new(500, 0.5).space_needed(), 500);
        assert_eq!(SpaceRequirement::new(500, -3.0).factor(), 1.0);
        assert_eq!(SpaceRequirement::new(500, f64::NAN).factor(), 1.0);
        assert_eq!(SpaceRequirement::new(500, 2.0).space_needed(), 1000);
    }

    #[test]
    fn huge_product_saturates() {
        let req = SpaceRequirement::new(u64::MAX, 4.0);
        assert_eq!(req.space_needed(), u64::MAX);
    }

    #[test]
    fn job_without_requirement_needs_nothing() {
        assert_eq!(Job::new("plain").space_needed(), 0);
        assert_eq!(Job::new("sized").with_required_space(2_000_000).space_needed(), 2_000_000);
    }

    #[test]
    fn disabled_settings_declare_no_requirement() {
        let settings = JobSettings {
            use_required_space: false,
            required_space: 42,
            factor: 2.0,
        };
        assert!(settings.requirement().is_none());

        let settings = JobSettings::enabled(42, 2.0);
        assert_eq!(settings.requirement().unwrap().space_needed(), 84);
    }

    #[test]
    fn catalog_lookup_by_name() {
        let catalog = JobCatalog::new()
            .with_job(Job::new("a").with_required_space(10))
            .with_job(Job::new("b"));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.space_needed("a"), 10);
        assert_eq!(catalog.space_needed("b"), 0);
        assert_eq!(catalog.space_needed("missing"), 0);
        assert!(catalog.job("missing").is_none());
    }
}
