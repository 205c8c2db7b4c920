//! spaceleft admission: disk space veto for build placements.
//!
//! A build queue asks, for each `(host, job)` candidate, whether the host has
//! room for the job. The answer accounts for everything already living on
//! the host: each workspace directory under `<root>/workspace` is attributed
//! to its job and charged that job's configured requirement.
//!
//! # Components
//!
//! - **`host`**: Host model and the space-accounting capability check
//! - **`scanner`**: Workspace directory listing and owner resolution
//! - **`free_space`**: Usable space probe (`Unavailable` on failure)
//! - **`aggregator`**: Required space of resident workspaces, with budgeted early exit
//! - **`dispatcher`**: The admission decision and queue hook
//!
//! # Decision
//!
//! ```text
//! remaining = usable_space(host)
//!           - (REQUIRED_SPACE override | candidate requirement)
//!           - Σ requirement(owner(dir)) for dir in workspaces, owner != candidate
//! clamped at 0; allowed = remaining > 0
//! ```

pub mod aggregator;
pub mod dispatcher;
pub mod free_space;
pub mod host;
pub mod scanner;

pub use aggregator::RequiredSpaceAggregator;
pub use dispatcher::{
    AdmissionResult, BlockReason, BuildableItem, PlacementRequest, REQUIRED_SPACE_PARAMETER,
    SpaceLeftDispatcher, parse_required_space,
};
pub use free_space::{FixedSpaceProbe, FreeSpace, FsSpaceProbe, SpaceProbe, usable_space};
pub use host::{Host, HostKind, supports_space_accounting};
pub use scanner::{ResidentWorkspace, WorkspaceScanner};
