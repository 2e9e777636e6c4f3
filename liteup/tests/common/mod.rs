//! Shared test fakes for liteup integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use liteup::errors::ServiceCallError;
use liteup::service::*;
use liteup::util::DiskSpaceProbe;
use liteup::{
    ErrorCode, Manager, ManagerOptions, RestartId, RestartObserver, RestartOptions,
    RestartRegistry, RestartState, TaskRunner, VmResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// The full remote call chain of one successful restart, in order.
pub const RESTART_CALLS: [&str; 7] = [
    "component_load",
    "start_vm_service",
    "vm_wait_available",
    "container_wait_available",
    "create_disk_image",
    "start_vm",
    "start_container",
];

/// Scriptable stand-in for every external service.
///
/// Records each call by name. A call can be held until the test releases
/// it with [`FakeBackend::gate`].
pub struct FakeBackend {
    calls: Mutex<Vec<&'static str>>,
    gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
    /// Calls that fail at the transport level instead of replying.
    pub no_reply: Mutex<Vec<&'static str>>,

    pub online: AtomicBool,
    pub component_result: Mutex<Result<PathBuf, ServiceCallError>>,
    pub policies: Mutex<Vec<UpdatePolicy>>,

    pub host_starts: AtomicBool,
    pub vm_available: AtomicBool,
    pub container_available: AtomicBool,

    pub create_disk: Mutex<CreateDiskImageResponse>,
    pub disk_requests: Mutex<Vec<CreateDiskImageRequest>>,
    pub destroy_disk: Mutex<DestroyDiskImageResponse>,
    pub list_disks: Mutex<ListVmDisksResponse>,
    pub start_vm: Mutex<SuccessResponse>,
    pub stop_vm: Mutex<SuccessResponse>,
    pub start_container: Mutex<StartContainerResponse>,
    pub ssh_keys: Mutex<ContainerSshKeys>,
    pub launch: Mutex<SuccessResponse>,
    pub install: Mutex<InstallPackageResponse>,

    pub signals_connected: AtomicBool,
    pub progress_connected: AtomicBool,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            no_reply: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            component_result: Mutex::new(Ok(PathBuf::from("/run/component/vm-runtime"))),
            policies: Mutex::new(Vec::new()),
            host_starts: AtomicBool::new(true),
            vm_available: AtomicBool::new(true),
            container_available: AtomicBool::new(true),
            create_disk: Mutex::new(CreateDiskImageResponse {
                status: DiskImageStatus::Created,
                failure_reason: String::new(),
                disk_path: "/home/root/owner1/vm1.qcow2".into(),
            }),
            disk_requests: Mutex::new(Vec::new()),
            destroy_disk: Mutex::new(DestroyDiskImageResponse {
                status: DiskImageStatus::Destroyed,
                failure_reason: String::new(),
            }),
            list_disks: Mutex::new(ListVmDisksResponse {
                success: true,
                failure_reason: String::new(),
                total_size: 0,
            }),
            start_vm: Mutex::new(SuccessResponse::ok()),
            stop_vm: Mutex::new(SuccessResponse::ok()),
            start_container: Mutex::new(StartContainerResponse {
                status: ContainerStatus::Running,
                failure_reason: String::new(),
            }),
            ssh_keys: Mutex::new(ContainerSshKeys::default()),
            launch: Mutex::new(SuccessResponse::ok()),
            install: Mutex::new(InstallPackageResponse {
                status: InstallPackageStatus::Started,
                failure_reason: String::new(),
            }),
            signals_connected: AtomicBool::new(true),
            progress_connected: AtomicBool::new(true),
        }
    }
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|call| **call == name).count()
    }

    /// Hold every future call to `name` until a permit is added.
    pub fn gate(&self, name: &'static str) -> Arc<Semaphore> {
        self.gates
            .lock()
            .entry(name)
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    pub fn set_start_container_status(&self, status: ContainerStatus) {
        self.start_container.lock().status = status;
    }

    async fn enter(&self, name: &'static str) {
        self.calls.lock().push(name);
        let gate = self.gates.lock().get(name).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }

    fn reply(&self, service: &'static str, name: &'static str) -> Result<(), ServiceCallError> {
        if self.no_reply.lock().contains(&name) {
            return Err(ServiceCallError::empty_response(service, name));
        }
        Ok(())
    }
}

#[async_trait]
impl HostServiceLauncher for FakeBackend {
    async fn start_vm_service(&self) -> bool {
        self.enter("start_vm_service").await;
        self.host_starts.load(Ordering::SeqCst)
    }

    async fn stop_vm_service(&self) -> bool {
        self.enter("stop_vm_service").await;
        true
    }
}

#[async_trait]
impl VmServiceClient for FakeBackend {
    async fn wait_for_service_available(&self) -> bool {
        self.enter("vm_wait_available").await;
        self.vm_available.load(Ordering::SeqCst)
    }

    async fn create_disk_image(
        &self,
        request: CreateDiskImageRequest,
    ) -> Result<CreateDiskImageResponse, ServiceCallError> {
        self.enter("create_disk_image").await;
        self.disk_requests.lock().push(request);
        Ok(self.create_disk.lock().clone())
    }

    async fn destroy_disk_image(
        &self,
        _request: DestroyDiskImageRequest,
    ) -> Result<DestroyDiskImageResponse, ServiceCallError> {
        self.enter("destroy_disk_image").await;
        Ok(self.destroy_disk.lock().clone())
    }

    async fn list_vm_disks(
        &self,
        _request: ListVmDisksRequest,
    ) -> Result<ListVmDisksResponse, ServiceCallError> {
        self.enter("list_vm_disks").await;
        Ok(self.list_disks.lock().clone())
    }

    async fn start_vm(
        &self,
        _request: StartVmRequest,
    ) -> Result<SuccessResponse, ServiceCallError> {
        self.enter("start_vm").await;
        self.reply(VM_SERVICE, "start_vm")?;
        Ok(self.start_vm.lock().clone())
    }

    async fn stop_vm(&self, _request: StopVmRequest) -> Result<SuccessResponse, ServiceCallError> {
        self.enter("stop_vm").await;
        Ok(self.stop_vm.lock().clone())
    }

    async fn start_container(
        &self,
        _request: StartContainerRequest,
    ) -> Result<StartContainerResponse, ServiceCallError> {
        self.enter("start_container").await;
        self.reply(VM_SERVICE, "start_container")?;
        Ok(self.start_container.lock().clone())
    }

    async fn get_container_ssh_keys(
        &self,
        _request: ContainerSshKeysRequest,
    ) -> Result<ContainerSshKeys, ServiceCallError> {
        self.enter("get_container_ssh_keys").await;
        Ok(self.ssh_keys.lock().clone())
    }

    fn is_container_startup_failed_signal_connected(&self) -> bool {
        self.signals_connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerServiceClient for FakeBackend {
    async fn wait_for_service_available(&self) -> bool {
        self.enter("container_wait_available").await;
        self.container_available.load(Ordering::SeqCst)
    }

    async fn launch_container_application(
        &self,
        _request: LaunchApplicationRequest,
    ) -> Result<SuccessResponse, ServiceCallError> {
        self.enter("launch_container_application").await;
        Ok(self.launch.lock().clone())
    }

    async fn get_container_app_icons(
        &self,
        request: AppIconRequest,
    ) -> Result<Vec<AppIcon>, ServiceCallError> {
        self.enter("get_container_app_icons").await;
        Ok(request
            .desktop_file_ids
            .into_iter()
            .map(|desktop_file_id| AppIcon {
                desktop_file_id,
                content: vec![0x89, b'P', b'N', b'G'],
            })
            .collect())
    }

    async fn install_linux_package(
        &self,
        _request: InstallPackageRequest,
    ) -> Result<InstallPackageResponse, ServiceCallError> {
        self.enter("install_linux_package").await;
        self.reply(CONTAINER_SERVICE, "install_linux_package")?;
        Ok(self.install.lock().clone())
    }

    fn is_container_started_signal_connected(&self) -> bool {
        self.signals_connected.load(Ordering::SeqCst)
    }

    fn is_container_shutdown_signal_connected(&self) -> bool {
        self.signals_connected.load(Ordering::SeqCst)
    }

    fn is_install_package_progress_signal_connected(&self) -> bool {
        self.progress_connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComponentLoader for FakeBackend {
    async fn load(&self, policy: UpdatePolicy) -> Result<PathBuf, ServiceCallError> {
        self.enter("component_load").await;
        self.policies.lock().push(policy);
        self.component_result.lock().clone()
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Reports a fixed amount of free space.
pub struct FixedProbe(pub u64);

impl DiskSpaceProbe for FixedProbe {
    fn free_bytes(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub manager: Manager,
}

impl Harness {
    pub fn registry(&self, options: RestartOptions) -> RestartRegistry {
        RestartRegistry::new(self.manager.clone(), TaskRunner::current(), options)
    }
}

/// Manager over a fresh [`FakeBackend`] with 100 GiB free.
pub fn harness() -> Harness {
    harness_with(ManagerOptions::default(), 100 * GIB)
}

pub fn harness_with(options: ManagerOptions, free_bytes: u64) -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let clients = ServiceClients {
        host: backend.clone(),
        vm: backend.clone(),
        container: backend.clone(),
        component: backend.clone(),
    };
    let manager = Manager::builder(clients)
        .options(options)
        .runner(TaskRunner::current())
        .disk_space_probe(Arc::new(FixedProbe(free_bytes)))
        .build();
    Harness { backend, manager }
}

/// Let spawned tasks on the current-thread runtime run until they block.
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

/// Records every step notification it receives.
#[derive(Default)]
pub struct RecordingObserver {
    pub steps: Mutex<Vec<(RestartId, RestartState, Option<ErrorCode>)>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<RestartState> {
        self.steps.lock().iter().map(|(_, state, _)| *state).collect()
    }
}

impl RestartObserver for RecordingObserver {
    fn on_step_finished(&self, id: RestartId, step: RestartState, result: &VmResult<()>) {
        self.steps
            .lock()
            .push((id, step, result.as_ref().err().map(|e| e.code())));
    }
}
