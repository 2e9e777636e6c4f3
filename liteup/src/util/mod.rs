//! Host utilities.

mod disk_space;

pub use disk_space::{DiskSpaceProbe, StatvfsProbe};
