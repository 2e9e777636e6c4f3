//! Clients for the external host services.
//!
//! ## Architecture
//!
//! - **HostServiceLauncher**: starts/stops the privileged VM service process
//! - **VmServiceClient**: disk images, VM start/stop, container start, SSH keys
//! - **ContainerServiceClient**: app launch, icons, package install
//! - **ComponentLoader**: installs/mounts the VM runtime component
//!
//! Only [`Manager`](crate::Manager) calls these. Lifecycle signals
//! (container started/failed/shutdown, install progress) are pushed back to
//! the manager separately as [`ServiceSignal`]s.

mod types;

pub use types::{
    AppIcon, AppIconRequest, ContainerSshKeys, ContainerSshKeysRequest, ContainerStatus,
    CreateDiskImageRequest, CreateDiskImageResponse, DestroyDiskImageRequest,
    DestroyDiskImageResponse, DiskImageStatus, DiskImageType, InstallPackageRequest,
    InstallPackageResponse, InstallPackageStatus, InstallProgressSignal, InstallProgressStatus,
    LaunchApplicationRequest, ListVmDisksRequest, ListVmDisksResponse, ServiceSignal,
    StartContainerRequest, StartContainerResponse, StartVmRequest, StopVmRequest,
    StorageLocation, SuccessResponse, VmDisk,
};

use crate::errors::ServiceCallError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Service names client implementations report in [`ServiceCallError`]s.
pub const VM_SERVICE: &str = "vm-service";
pub const CONTAINER_SERVICE: &str = "container-service";

/// Starts and stops the privileged service that brokers VM operations.
#[async_trait]
pub trait HostServiceLauncher: Send + Sync {
    /// Ask the host to launch the VM service. Returns whether it launched.
    async fn start_vm_service(&self) -> bool;

    async fn stop_vm_service(&self) -> bool;
}

/// Client for the VM service.
#[async_trait]
pub trait VmServiceClient: Send + Sync {
    /// Resolve once the service has announced availability (or never will).
    async fn wait_for_service_available(&self) -> bool;

    async fn create_disk_image(
        &self,
        request: CreateDiskImageRequest,
    ) -> Result<CreateDiskImageResponse, ServiceCallError>;

    async fn destroy_disk_image(
        &self,
        request: DestroyDiskImageRequest,
    ) -> Result<DestroyDiskImageResponse, ServiceCallError>;

    async fn list_vm_disks(
        &self,
        request: ListVmDisksRequest,
    ) -> Result<ListVmDisksResponse, ServiceCallError>;

    async fn start_vm(&self, request: StartVmRequest) -> Result<SuccessResponse, ServiceCallError>;

    async fn stop_vm(&self, request: StopVmRequest) -> Result<SuccessResponse, ServiceCallError>;

    async fn start_container(
        &self,
        request: StartContainerRequest,
    ) -> Result<StartContainerResponse, ServiceCallError>;

    async fn get_container_ssh_keys(
        &self,
        request: ContainerSshKeysRequest,
    ) -> Result<ContainerSshKeys, ServiceCallError>;

    fn is_container_startup_failed_signal_connected(&self) -> bool;
}

/// Client for the container service.
#[async_trait]
pub trait ContainerServiceClient: Send + Sync {
    async fn wait_for_service_available(&self) -> bool;

    async fn launch_container_application(
        &self,
        request: LaunchApplicationRequest,
    ) -> Result<SuccessResponse, ServiceCallError>;

    async fn get_container_app_icons(
        &self,
        request: AppIconRequest,
    ) -> Result<Vec<AppIcon>, ServiceCallError>;

    async fn install_linux_package(
        &self,
        request: InstallPackageRequest,
    ) -> Result<InstallPackageResponse, ServiceCallError>;

    fn is_container_started_signal_connected(&self) -> bool;

    fn is_container_shutdown_signal_connected(&self) -> bool;

    fn is_install_package_progress_signal_connected(&self) -> bool;
}

/// Update policy for a runtime component load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Check upstream for a newer version before mounting.
    Force,
    /// Use whatever version is present locally.
    DontForce,
}

/// Installs and mounts the VM runtime component.
#[async_trait]
pub trait ComponentLoader: Send + Sync {
    /// Load the component, returning its mounted path.
    async fn load(&self, policy: UpdatePolicy) -> Result<PathBuf, ServiceCallError>;

    /// Whether the network is reachable. Forced loads are skipped offline.
    fn is_online(&self) -> bool;
}

/// The full set of service clients the manager talks to.
#[derive(Clone)]
pub struct ServiceClients {
    pub host: Arc<dyn HostServiceLauncher>,
    pub vm: Arc<dyn VmServiceClient>,
    pub container: Arc<dyn ContainerServiceClient>,
    pub component: Arc<dyn ComponentLoader>,
}

impl std::fmt::Debug for ServiceClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClients").finish()
    }
}
