//! StateStore: redb-backed persistence for job settings and build history.
//!
//! Provides typed CRUD over job settings and build records, plus the
//! history queries the measurement side relies on: latest value of a build
//! parameter, and the latest value of one parameter per distinct value of
//! another. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::{debug, warn};

use spaceleft_core::{Job, JobLookup, JobSettings};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.open_table(BUILDS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Jobs ───────────────────────────────────────────────────────

    /// Insert or update a job's space settings.
    pub fn put_job(&self, name: &str, settings: &JobSettings) -> StateResult<()> {
        validate_job_name(name)?;
        let value = serde_json::to_vec(settings).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(JOBS).map_err(map_err!(Table))?;
            table
                .insert(name, value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(job = %name, "job settings stored");
        Ok(())
    }

    /// Get a job's space settings by name.
    pub fn get_job(&self, name: &str) -> StateResult<Option<JobSettings>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(JOBS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Storage))? {
            Some(guard) => {
                let settings: JobSettings =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }

    /// List all jobs with their settings, ordered by name.
    pub fn list_jobs(&self) -> StateResult<Vec<(String, JobSettings)>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(JOBS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (key, value) = entry.map_err(map_err!(Storage))?;
            let settings: JobSettings =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push((key.value().to_string(), settings));
        }
        Ok(results)
    }

    /// Delete a job's settings. Returns true if it existed.
    ///
    /// Build history is kept; it belongs to the builds, not the settings.
    pub fn delete_job(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(JOBS).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(job = %name, existed, "job settings deleted");
        Ok(existed)
    }

    // ── Builds ─────────────────────────────────────────────────────

    /// Insert or replace a build record.
    pub fn put_build(&self, build: &BuildRecord) -> StateResult<()> {
        validate_job_name(&build.job)?;
        let key = build.table_key();
        let value = serde_json::to_vec(build).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(BUILDS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "build stored");
        Ok(())
    }

    /// Get a single build of a job.
    pub fn get_build(&self, job: &str, number: u64) -> StateResult<Option<BuildRecord>> {
        let key = build_key(job, number);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(BUILDS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Storage))? {
            Some(guard) => {
                let build: BuildRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(build))
            }
            None => Ok(None),
        }
    }

    /// List all builds of a job, newest first.
    pub fn list_builds_for_job(&self, job: &str) -> StateResult<Vec<BuildRecord>> {
        let prefix = build_prefix(job);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(BUILDS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (key, value) = entry.map_err(map_err!(Storage))?;
            if !key.value().starts_with(&prefix) {
                continue;
            }
            let build: BuildRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            // "a:" also prefixes the keys of a job named "a:b".
            if build.job == job {
                results.push(build);
            }
        }
        results.sort_by(|a, b| b.number.cmp(&a.number));
        Ok(results)
    }

    /// Number the next build of `job` would get (1 for a job with no history).
    pub fn next_build_number(&self, job: &str) -> StateResult<u64> {
        let latest = self
            .list_builds_for_job(job)?
            .first()
            .map_or(0, |b| b.number);
        Ok(latest + 1)
    }

    /// Record one parameter on a build, creating the build record if needed.
    pub fn set_build_parameter(
        &self,
        job: &str,
        number: u64,
        key: &str,
        value: &str,
    ) -> StateResult<()> {
        let mut build = self
            .get_build(job, number)?
            .unwrap_or_else(|| BuildRecord::new(job, number));
        build.parameters.insert(key.to_string(), value.to_string());
        self.put_build(&build)
    }

    /// Delete all builds of a job. Returns number deleted.
    pub fn delete_builds_for_job(&self, job: &str) -> StateResult<u32> {
        let keys: Vec<String> = self
            .list_builds_for_job(job)?
            .iter()
            .map(BuildRecord::table_key)
            .collect();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u32;
        {
            let mut table = txn.open_table(BUILDS).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Storage))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(count)
    }

    // ── History queries ────────────────────────────────────────────

    /// Value of `key` on the most recent build of `job` that carries it.
    pub fn latest_param_value(&self, job: &str, key: &str) -> StateResult<Option<String>> {
        Ok(self
            .list_builds_for_job(job)?
            .into_iter()
            .find_map(|b| b.parameters.get(key).cloned()))
    }

    /// For every distinct value of `key_param` across the builds of `job`,
    /// the `value_param` of the most recent build carrying both.
    ///
    /// Used to cross-reference variant builds, e.g. workspace size per
    /// component name.
    pub fn build_param_value_map(
        &self,
        job: &str,
        key_param: &str,
        value_param: &str,
    ) -> StateResult<HashMap<String, String>> {
        let mut map = HashMap::new();
        for build in self.list_builds_for_job(job)? {
            let (Some(k), Some(v)) = (build.parameter(key_param), build.parameter(value_param))
            else {
                continue;
            };
            map.entry(k.to_string()).or_insert_with(|| v.to_string());
        }
        Ok(map)
    }

    /// Most recent measured workspace size of `job`, in bytes.
    ///
    /// Values that don't parse as a byte count are logged and skipped in
    /// favour of older measurements.
    pub fn latest_workspace_size(&self, job: &str) -> StateResult<Option<u64>> {
        for build in self.list_builds_for_job(job)? {
            let Some(raw) = build.parameter(WORKSPACE_SIZE_PARAM) else {
                continue;
            };
            match raw.trim().parse::<u64>() {
                Ok(size) => return Ok(Some(size)),
                Err(e) => warn!(
                    job = %job,
                    build = build.number,
                    value = %raw,
                    error = %e,
                    "ignoring unparsable workspace size"
                ),
            }
        }
        Ok(None)
    }
}

/// Job names key both tables and double as workspace directory names.
fn validate_job_name(name: &str) -> StateResult<()> {
    if name.trim().is_empty() || name.contains(['/', '\\']) {
        return Err(StateError::InvalidJobName(name.to_string()));
    }
    Ok(())
}

impl JobLookup for StateStore {
    fn job(&self, name: &str) -> Option<Job> {
        match self.get_job(name) {
            Ok(Some(settings)) => Some(Job {
                name: name.to_string(),
                space: settings.requirement(),
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(job = %name, error = %e, "job lookup failed, treating job as unknown");
                None
            }
        }
    }
}
