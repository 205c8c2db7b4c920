//! Free space estimation for a host's filesystem.

use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::host::Host;

/// Usable space on a host, as far as it could be measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeSpace {
    /// The filesystem reported this many usable bytes (always > 0).
    Available(u64),
    /// The measurement failed or reported nothing usable.
    Unavailable,
}

impl FreeSpace {
    /// Byte count for accounting; `Unavailable` counts as no space at all.
    pub fn bytes(self) -> u64 {
        match self {
            FreeSpace::Available(bytes) => bytes,
            FreeSpace::Unavailable => 0,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, FreeSpace::Available(_))
    }
}

/// Filesystem query returning usable bytes for the filesystem holding `path`.
pub trait SpaceProbe: Send + Sync {
    fn usable_space(&self, path: &Path) -> io::Result<u64>;
}

/// Probe backed by the operating system's filesystem statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn usable_space(&self, path: &Path) -> io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Probe that always reports the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpaceProbe(pub Option<u64>);

impl SpaceProbe for FixedSpaceProbe {
    fn usable_space(&self, _path: &Path) -> io::Result<u64> {
        self.0
            .ok_or_else(|| io::Error::other("fixed probe reports no space information"))
    }
}

/// Measure the usable space on `host` with one probe call.
pub fn usable_space(host: &Host, probe: &dyn SpaceProbe) -> FreeSpace {
    let Some(root) = host.root() else {
        debug!(host = %host.name, "host root unresolved, free space unavailable");
        return FreeSpace::Unavailable;
    };

    match probe.usable_space(root) {
        Ok(0) => {
            debug!(host = %host.name, "filesystem reports no usable space");
            FreeSpace::Unavailable
        }
        Ok(bytes) => FreeSpace::Available(bytes),
        Err(e) => {
            warn!(host = %host.name, path = %root.display(), error = %e, "free space query failed");
            FreeSpace::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_counts_as_zero() {
        assert_eq!(FreeSpace::Unavailable.bytes(), 0);
        assert_eq!(FreeSpace::Available(42).bytes(), 42);
        assert!(!FreeSpace::Unavailable.is_available());
    }

    #[test]
    fn offline_host_is_unavailable() {
        let host = Host::offline_agent("gone");
        assert_eq!(usable_space(&host, &FixedSpaceProbe(Some(100))), FreeSpace::Unavailable);
    }

    #[test]
    fn zero_and_errors_are_unavailable() {
        let host = Host::agent("a1", "/srv/a1");
        assert_eq!(usable_space(&host, &FixedSpaceProbe(Some(0))), FreeSpace::Unavailable);
        assert_eq!(usable_space(&host, &FixedSpaceProbe(None)), FreeSpace::Unavailable);
        assert_eq!(
            usable_space(&host, &FixedSpaceProbe(Some(10))),
            FreeSpace::Available(10)
        );
    }

    #[test]
    fn real_filesystem_reports_space() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::agent("local", dir.path());
        assert!(usable_space(&host, &FsSpaceProbe).is_available());
    }

    #[test]
    fn missing_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::agent("ghost", dir.path().join("does-not-exist"));
        assert_eq!(usable_space(&host, &FsSpaceProbe), FreeSpace::Unavailable);
    }
}
