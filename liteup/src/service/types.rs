//! Request, response and signal types exchanged with the host services.
//!
//! These mirror the service contracts at the call boundary only; how they
//! travel over the wire is the client implementation's business.

use serde::{Deserialize, Serialize};

use crate::types::{ContainerKey, OwnerId};

// ============================================================================
// DISK IMAGES
// ============================================================================

/// Where a disk image is stored.
///
/// Only [`Root`](Self::Root) and [`Downloads`](Self::Downloads) are
/// sanctioned for disk images; anything else is rejected client-side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageLocation {
    /// Root of the owner's encrypted storage.
    Root,
    /// The owner's downloads directory.
    Downloads,
    /// A location code this client does not understand.
    Unknown(i32),
}

impl StorageLocation {
    pub fn is_sanctioned(&self) -> bool {
        matches!(self, Self::Root | Self::Downloads)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskImageType {
    Raw,
    #[default]
    Qcow2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskImageStatus {
    Created,
    Exists,
    Destroyed,
    DoesNotExist,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDiskImageRequest {
    pub owner_id: OwnerId,
    pub disk_path: String,
    pub storage_location: StorageLocation,
    pub image_type: DiskImageType,
    /// Logical size of the new image, in bytes.
    pub disk_size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDiskImageResponse {
    pub status: DiskImageStatus,
    pub failure_reason: String,
    pub disk_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyDiskImageRequest {
    pub owner_id: OwnerId,
    pub disk_path: String,
    pub storage_location: StorageLocation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyDiskImageResponse {
    pub status: DiskImageStatus,
    pub failure_reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVmDisksRequest {
    pub owner_id: OwnerId,
    pub storage_location: StorageLocation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVmDisksResponse {
    pub success: bool,
    pub failure_reason: String,
    /// Combined size of all VM disks, in bytes.
    pub total_size: u64,
}

// ============================================================================
// VMS
// ============================================================================

/// A disk attached to a VM at start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDisk {
    pub path: String,
    pub image_type: DiskImageType,
    pub writable: bool,
    pub do_mount: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartVmRequest {
    pub owner_id: OwnerId,
    pub name: String,
    pub disks: Vec<VmDisk>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopVmRequest {
    pub owner_id: OwnerId,
    pub name: String,
}

/// Reply shape shared by calls that only report success or failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub failure_reason: String,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            failure_reason: String::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            failure_reason: reason.into(),
        }
    }
}

// ============================================================================
// CONTAINERS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    /// Start accepted; completion arrives later as a signal.
    Starting,
    Running,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartContainerRequest {
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
    pub container_username: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartContainerResponse {
    pub status: ContainerStatus,
    pub failure_reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSshKeysRequest {
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSshKeys {
    pub container_public_key: String,
    pub host_private_key: String,
    pub hostname: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchApplicationRequest {
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
    pub desktop_file_id: String,
    /// Absolute paths inside the container.
    pub files: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIconRequest {
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
    pub desktop_file_ids: Vec<String>,
    pub size: u32,
    pub scale: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIcon {
    pub desktop_file_id: String,
    /// Encoded image bytes.
    pub content: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPackageRequest {
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
    pub file_path: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallPackageStatus {
    /// Install started; progress arrives through signals.
    Started,
    Failed,
    AlreadyActive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPackageResponse {
    pub status: InstallPackageStatus,
    pub failure_reason: String,
}

// ============================================================================
// SIGNALS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallProgressStatus {
    Downloading,
    Installing,
    Succeeded,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallProgressSignal {
    pub container: ContainerKey,
    pub status: InstallProgressStatus,
    /// Reported percentage. Values outside `0..=100` are dropped.
    pub progress_percent: i32,
    pub failure_details: String,
}

/// Push notifications from the services, not correlated 1:1 with requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceSignal {
    ContainerStarted(ContainerKey),
    ContainerStartupFailed(ContainerKey),
    ContainerShutdown(ContainerKey),
    InstallPackageProgress(InstallProgressSignal),
}
