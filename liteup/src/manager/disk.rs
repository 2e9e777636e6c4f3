//! Disk image lifecycle.

use super::Manager;
use crate::errors::{VmError, VmResult};
use crate::service::{
    CreateDiskImageRequest, DestroyDiskImageRequest, DiskImageStatus, DiskImageType,
    ListVmDisksRequest, StorageLocation,
};
use crate::types::OwnerId;
use std::path::{Path, PathBuf};

impl Manager {
    /// Create the disk image for a VM, sized from current free space.
    ///
    /// Requests [`reserve_percent`](crate::ManagerOptions::reserve_percent)
    /// of the free space on the probe path. Returns the path the VM service
    /// reports for the image (existing images are reused).
    pub async fn create_disk_image(
        &self,
        owner_id: &OwnerId,
        disk_path: &Path,
        location: StorageLocation,
    ) -> VmResult<PathBuf> {
        let disk_path = validate_disk_request(owner_id, disk_path, location)?;

        let disk_size = self.reserve_disk_size().await?;

        tracing::debug!(
            owner_id = %owner_id,
            disk_path = %disk_path,
            ?location,
            disk_size,
            "Creating disk image"
        );

        let request = CreateDiskImageRequest {
            owner_id: owner_id.clone(),
            disk_path,
            storage_location: location,
            image_type: DiskImageType::Qcow2,
            disk_size,
        };

        let response = self
            .inner
            .clients
            .vm
            .create_disk_image(request)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create disk image");
                VmError::DiskCreateFailed(e.to_string())
            })?;

        match response.status {
            DiskImageStatus::Created | DiskImageStatus::Exists => {
                tracing::info!(
                    path = %response.disk_path,
                    status = ?response.status,
                    "Disk image ready"
                );
                Ok(PathBuf::from(response.disk_path))
            }
            status => {
                tracing::error!(
                    ?status,
                    reason = %response.failure_reason,
                    "Failed to create disk image"
                );
                Err(VmError::DiskCreateFailed(response.failure_reason))
            }
        }
    }

    pub async fn destroy_disk_image(
        &self,
        owner_id: &OwnerId,
        disk_path: &Path,
        location: StorageLocation,
    ) -> VmResult<()> {
        let disk_path = validate_disk_request(owner_id, disk_path, location)?;

        tracing::debug!(owner_id = %owner_id, disk_path = %disk_path, "Destroying disk image");

        let request = DestroyDiskImageRequest {
            owner_id: owner_id.clone(),
            disk_path,
            storage_location: location,
        };

        let response = self
            .inner
            .clients
            .vm
            .destroy_disk_image(request)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to destroy disk image");
                VmError::DiskDestroyFailed(e.to_string())
            })?;

        match response.status {
            DiskImageStatus::Destroyed | DiskImageStatus::DoesNotExist => Ok(()),
            status => {
                tracing::error!(
                    ?status,
                    reason = %response.failure_reason,
                    "Failed to destroy disk image"
                );
                Err(VmError::DiskDestroyFailed(response.failure_reason))
            }
        }
    }

    /// Total size of the owner's VM disks, in bytes.
    pub async fn list_vm_disks(&self, owner_id: &OwnerId) -> VmResult<u64> {
        if owner_id.is_empty() {
            return Err(VmError::client("owner id is required"));
        }

        let request = ListVmDisksRequest {
            owner_id: owner_id.clone(),
            storage_location: StorageLocation::Root,
        };

        let response = self
            .inner
            .clients
            .vm
            .list_vm_disks(request)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list VM disks");
                VmError::ListVmDisksFailed(e.to_string())
            })?;

        if !response.success {
            tracing::error!(reason = %response.failure_reason, "Failed to list VM disks");
            return Err(VmError::ListVmDisksFailed(response.failure_reason));
        }
        Ok(response.total_size)
    }

    /// Probe free space off the control context and apply the reserve and
    /// minimum size policy.
    async fn reserve_disk_size(&self) -> VmResult<u64> {
        let options = &self.inner.options;
        let probe = self.inner.disk_space.clone();
        let probe_path = options.free_space_probe_path.clone();

        let free = match self
            .inner
            .runner
            .run_blocking(move || probe.free_bytes(&probe_path))
            .await
        {
            Ok(Ok(free)) => free,
            Ok(Err(e)) => {
                tracing::warn!(
                    path = %options.free_space_probe_path.display(),
                    error = %e,
                    "Free space probe failed, assuming no free space"
                );
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, "Free space probe task failed, assuming no free space");
                0
            }
        };

        let disk_size = options.reserved_disk_size(free);
        if disk_size < options.minimum_disk_size {
            if options.enforce_minimum_disk_size {
                tracing::error!(
                    free,
                    disk_size,
                    minimum = options.minimum_disk_size,
                    "Insufficient disk space to create VM disk image"
                );
                return Err(VmError::client(format!(
                    "insufficient disk space: {disk_size} bytes reserved, {} required",
                    options.minimum_disk_size
                )));
            }
            tracing::debug!(free, disk_size, "Ignoring minimum disk size");
        }
        Ok(disk_size)
    }
}

fn validate_disk_request(
    owner_id: &OwnerId,
    disk_path: &Path,
    location: StorageLocation,
) -> VmResult<String> {
    if owner_id.is_empty() {
        return Err(VmError::client("owner id is required"));
    }
    let disk_path = match disk_path.to_str() {
        Some(path) if !path.is_empty() => path.to_string(),
        _ => return Err(VmError::client("disk path is required")),
    };
    if !location.is_sanctioned() {
        return Err(VmError::client(format!(
            "unsupported storage location: {location:?}"
        )));
    }
    Ok(disk_path)
}
