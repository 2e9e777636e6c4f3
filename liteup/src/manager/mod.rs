//! Manager - the single owner of VM and container bookkeeping.
//!
//! ## Architecture
//!
//! This module is organized into focused submodules:
//! - `component`: runtime component install and host service start/stop
//! - `disk`: disk image create/destroy/list with free space sizing
//! - `vm`: VM start/stop and the running-VM set
//! - `container`: container start, app launch, icons, package install
//! - `signals`: routing of pushed service signals to pending requests
//!
//! The manager is the only component that talks to the service clients.
//! Restarts and the registry go through its async API and never touch the
//! running sets directly.

mod component;
mod container;
mod disk;
mod signals;
mod vm;

pub use signals::{InstallProgressObserver, ShutdownCallback};

use crate::errors::VmResult;
use crate::options::ManagerOptions;
use crate::runner::TaskRunner;
use crate::service::ServiceClients;
use crate::types::{ContainerKey, OwnerId, VmKey};
use crate::util::{DiskSpaceProbe, StatvfsProbe};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Failure reason the VM service reports when stopping a VM that is not
/// running. Treated as a successful stop.
pub const VM_DOES_NOT_EXIST: &str = "Requested VM does not exist";

type PendingStart = oneshot::Sender<VmResult<()>>;

/// Mutable bookkeeping, guarded by one lock.
///
/// The lock is never held across an `.await` or while running a callback.
#[derive(Default)]
struct ManagerState {
    running_vms: HashSet<VmKey>,
    running_containers: HashMap<VmKey, BTreeSet<String>>,
    /// Container starts the VM service reported as "starting"; resolved by
    /// the container started/startup failed signals.
    pending_starts: HashMap<ContainerKey, Vec<PendingStart>>,
    shutdown_callbacks: HashMap<ContainerKey, Vec<ShutdownCallback>>,
    install_observers: HashMap<OwnerId, Vec<Arc<dyn InstallProgressObserver>>>,
    component: ComponentState,
}

#[derive(Default)]
struct ComponentState {
    update_check_needed: bool,
    mounted_path: Option<PathBuf>,
}

struct ManagerInner {
    clients: ServiceClients,
    disk_space: Arc<dyn DiskSpaceProbe>,
    runner: TaskRunner,
    options: ManagerOptions,
    state: Mutex<ManagerState>,
}

/// Process-wide facade over the VM and container services.
///
/// Cheaply cloneable via `Arc`; all clones share the same bookkeeping.
/// Construct one per host application and pass it to each
/// [`RestartRegistry`](crate::RestartRegistry).
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Builds a [`Manager`].
///
/// # Example
///
/// ```ignore
/// let manager = Manager::builder(clients)
///     .options(ManagerOptions::dev())
///     .build();
/// ```
pub struct ManagerBuilder {
    clients: ServiceClients,
    runner: Option<TaskRunner>,
    options: ManagerOptions,
    disk_space: Arc<dyn DiskSpaceProbe>,
}

impl ManagerBuilder {
    pub fn options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Control context the manager posts its work onto.
    ///
    /// Defaults to the runtime `build()` is called from.
    pub fn runner(mut self, runner: TaskRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn disk_space_probe(mut self, probe: Arc<dyn DiskSpaceProbe>) -> Self {
        self.disk_space = probe;
        self
    }

    /// # Panics
    ///
    /// Panics if no runner was set and this is called outside a tokio runtime.
    pub fn build(self) -> Manager {
        let runner = self.runner.unwrap_or_else(TaskRunner::current);
        let state = ManagerState {
            component: ComponentState {
                update_check_needed: self.options.force_component_update_check,
                mounted_path: None,
            },
            ..Default::default()
        };

        tracing::debug!(options = ?self.options, "initialized manager");

        Manager {
            inner: Arc::new(ManagerInner {
                clients: self.clients,
                disk_space: self.disk_space,
                runner,
                options: self.options,
                state: Mutex::new(state),
            }),
        }
    }
}

impl Manager {
    pub fn builder(clients: ServiceClients) -> ManagerBuilder {
        ManagerBuilder {
            clients,
            runner: None,
            options: ManagerOptions::default(),
            disk_space: Arc::new(StatvfsProbe),
        }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.inner.options
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.inner.runner
    }

    /// Whether `vm_name` is running for `owner_id`.
    pub fn is_vm_running(&self, owner_id: &OwnerId, vm_name: &str) -> bool {
        let key = VmKey::new(owner_id.clone(), vm_name);
        self.inner.state.lock().running_vms.contains(&key)
    }

    /// Whether `container_name` is running inside `vm_name` for `owner_id`.
    pub fn is_container_running(
        &self,
        owner_id: &OwnerId,
        vm_name: &str,
        container_name: &str,
    ) -> bool {
        let key = VmKey::new(owner_id.clone(), vm_name);
        self.inner
            .state
            .lock()
            .running_containers
            .get(&key)
            .is_some_and(|containers| containers.contains(container_name))
    }

    /// Number of container starts waiting on a signal for `key`.
    ///
    /// Waiters whose start future has been dropped are not counted.
    pub fn pending_container_starts(&self, key: &ContainerKey) -> usize {
        self.inner
            .state
            .lock()
            .pending_starts
            .get(key)
            .map_or(0, |waiters| waiters.iter().filter(|tx| !tx.is_closed()).count())
    }
}
