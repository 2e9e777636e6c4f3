//! VM start/stop and the running-VM set.

use super::{Manager, VM_DOES_NOT_EXIST};
use crate::errors::{VmError, VmResult};
use crate::service::{DiskImageType, StartVmRequest, StopVmRequest, VmDisk};
use crate::types::{OwnerId, VmKey};
use std::path::Path;

impl Manager {
    /// Boot `vm_name` from the disk image at `disk_path`.
    ///
    /// The VM is recorded as running only once the VM service reports
    /// success.
    pub async fn start_vm(
        &self,
        owner_id: &OwnerId,
        vm_name: &str,
        disk_path: &Path,
    ) -> VmResult<()> {
        if owner_id.is_empty() {
            return Err(VmError::client("owner id is required"));
        }
        if vm_name.is_empty() {
            return Err(VmError::client("VM name is required"));
        }
        let disk_path = match disk_path.to_str() {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => return Err(VmError::client("disk path is required")),
        };

        tracing::debug!(owner_id = %owner_id, vm_name, disk_path = %disk_path, "Starting VM");

        let request = StartVmRequest {
            owner_id: owner_id.clone(),
            name: vm_name.to_string(),
            disks: vec![VmDisk {
                path: disk_path,
                image_type: DiskImageType::Qcow2,
                writable: true,
                do_mount: false,
            }],
        };

        let response = self.inner.clients.vm.start_vm(request).await.map_err(|e| {
            tracing::error!(vm_name, error = %e, "Failed to start VM");
            VmError::VmStartFailed(e.to_string())
        })?;

        if !response.success {
            tracing::error!(vm_name, reason = %response.failure_reason, "Failed to start VM");
            return Err(VmError::VmStartFailed(response.failure_reason));
        }

        self.inner
            .state
            .lock()
            .running_vms
            .insert(VmKey::new(owner_id.clone(), vm_name));
        tracing::info!(owner_id = %owner_id, vm_name, "VM started");
        Ok(())
    }

    /// Stop `vm_name`.
    ///
    /// Stopping a VM the service does not know about counts as success.
    /// On success the VM and every container recorded under it are dropped
    /// from the running sets.
    pub async fn stop_vm(&self, owner_id: &OwnerId, vm_name: &str) -> VmResult<()> {
        if owner_id.is_empty() {
            return Err(VmError::client("owner id is required"));
        }
        if vm_name.is_empty() {
            return Err(VmError::client("VM name is required"));
        }

        tracing::debug!(owner_id = %owner_id, vm_name, "Stopping VM");

        let request = StopVmRequest {
            owner_id: owner_id.clone(),
            name: vm_name.to_string(),
        };

        let response = self.inner.clients.vm.stop_vm(request).await.map_err(|e| {
            tracing::error!(vm_name, error = %e, "Failed to stop VM");
            VmError::VmStopFailed(e.to_string())
        })?;

        if !response.success {
            if response.failure_reason != VM_DOES_NOT_EXIST {
                tracing::error!(vm_name, reason = %response.failure_reason, "Failed to stop VM");
                return Err(VmError::VmStopFailed(response.failure_reason));
            }
            tracing::debug!(vm_name, "VM already stopped");
        }

        let key = VmKey::new(owner_id.clone(), vm_name);
        let mut state = self.inner.state.lock();
        state.running_vms.remove(&key);
        let containers = state.running_containers.remove(&key);
        drop(state);

        tracing::info!(
            owner_id = %owner_id,
            vm_name,
            containers = containers.map_or(0, |c| c.len()),
            "VM stopped"
        );
        Ok(())
    }
}
