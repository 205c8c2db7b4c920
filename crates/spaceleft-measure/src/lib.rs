//! spaceleft-measure: workspace size measurement.
//!
//! After a build finishes, its workspace is measured and the byte count is
//! stored as the `workspaceSize` parameter of that build. The admission
//! check never measures anything itself; it reads job requirements, which
//! [`calibrate_required_space`] can refresh from the latest measurement.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use spaceleft_state::{StateError, StateStore, WORKSPACE_SIZE_PARAM};

pub type MeasureResult<T> = Result<T, MeasureError>;

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("workspace does not exist: {0}")]
    WorkspaceMissing(PathBuf),

    #[error("failed to walk workspace: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// Apparent size of everything under `workspace`, in bytes.
///
/// Counts files and directories alike (like `du -sb`). Symlinks are counted
/// as links, never followed.
pub fn measure_workspace(workspace: &Path) -> MeasureResult<u64> {
    if !workspace.is_dir() {
        return Err(MeasureError::WorkspaceMissing(workspace.to_path_buf()));
    }

    let mut total = 0u64;
    for entry in WalkDir::new(workspace).follow_links(false) {
        let entry = entry?;
        let metadata = entry.metadata()?;
        total = total.saturating_add(metadata.len());
    }

    debug!(path = %workspace.display(), bytes = total, "workspace measured");
    Ok(total)
}

/// Measure `workspace` and store the result on build `build_number` of `job`.
pub fn record_workspace_size(
    store: &StateStore,
    job: &str,
    build_number: u64,
    workspace: &Path,
) -> MeasureResult<u64> {
    let size = measure_workspace(workspace)?;
    store.set_build_parameter(job, build_number, WORKSPACE_SIZE_PARAM, &size.to_string())?;
    info!(job = %job, build = build_number, bytes = size, "workspace size recorded");
    Ok(size)
}

/// Set the required space of `job` to its latest measured workspace size.
///
/// Turns the requirement on and keeps the configured factor. Returns the new
/// requirement, or `None` (leaving settings untouched) when the job has never
/// been measured.
pub fn calibrate_required_space(store: &StateStore, job: &str) -> MeasureResult<Option<u64>> {
    let Some(size) = store.latest_workspace_size(job)? else {
        debug!(job = %job, "no workspace measurement to calibrate from");
        return Ok(None);
    };

    let mut settings = store.get_job(job)?.unwrap_or_default();
    settings.use_required_space = true;
    settings.required_space = size;
    store.put_job(job, &settings)?;

    info!(job = %job, bytes = size, factor = settings.factor, "required space calibrated");
    Ok(Some(size))
}

/// Calibrate every job known to the store. Returns how many were updated.
pub fn calibrate_all(store: &StateStore) -> MeasureResult<usize> {
    let mut updated = 0;
    for (name, _) in store.list_jobs()? {
        if calibrate_required_space(store, &name)?.is_some() {
            updated += 1;
        }
    }
    Ok(updated)
}
