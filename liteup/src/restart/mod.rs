//! Restart orchestration.
//!
//! ## Architecture
//!
//! A restart brings one container online by running a fixed step chain
//! against the [`Manager`](crate::Manager):
//!
//! ```text
//!   1. ComponentLoading     (install/mount the VM runtime component)
//!   2. HostServiceStarting  (start VM service, wait for both services)
//!   3. DiskCreating         (create or reuse the VM disk image)
//!   4. VmStarting           (boot the VM from that image)
//!   5. ContainerStarting    (start the container, await its signal)
//! ```
//!
//! Each step is gated on the previous one succeeding and on the restart not
//! having been aborted. Observers hear about every step, failed ones too.
//!
//! [`RestartRegistry`] deduplicates registrations per (VM, container) key:
//! one restart drives the chain, the others wait for its result.

mod context;
mod observer;
mod registry;
mod restarter;
mod tasks;
mod types;

pub use observer::RestartObserver;
pub use registry::{RestartHandle, RestartRegistry};
pub use types::{RestartCallback, RestartInfo, RestartRequest, RestartState};
