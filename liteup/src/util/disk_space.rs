//! Free disk space probing.

use std::io;
use std::path::Path;

/// Reports free space on the filesystem holding a path.
///
/// Implementations may block; the manager always calls them through
/// [`TaskRunner::run_blocking`](crate::TaskRunner::run_blocking).
pub trait DiskSpaceProbe: Send + Sync {
    fn free_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// Probe backed by `statvfs(2)`.
///
/// Counts blocks available to unprivileged users, which is what a disk image
/// created on behalf of an owner can actually use.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl DiskSpaceProbe for StatvfsProbe {
    fn free_bytes(&self, path: &Path) -> io::Result<u64> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;
        #[allow(clippy::unnecessary_cast)]
        let free = (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64);
        Ok(free)
    }
}
