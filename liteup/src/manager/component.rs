//! Runtime component install and host service lifecycle.

use super::Manager;
use crate::errors::{VmError, VmResult};
use crate::service::UpdatePolicy;
use std::path::PathBuf;

impl Manager {
    /// Ensure the VM runtime component is present and mounted.
    ///
    /// A forced upstream freshness check happens at most until one succeeds,
    /// and never while offline. Once mounted, later calls return the cached
    /// path without reloading unless a freshness check is still owed and
    /// the network is up.
    ///
    /// Loads are not deduplicated: calls that overlap before the first load
    /// resolves each issue their own (forced, if owed) load.
    pub async fn ensure_runtime_component(&self) -> VmResult<PathBuf> {
        let online = self.inner.clients.component.is_online();
        let policy = {
            let state = self.inner.state.lock();
            let check_owed = state.component.update_check_needed && online;
            if let Some(path) = &state.component.mounted_path
                && !check_owed
            {
                tracing::trace!(path = %path.display(), "Runtime component already mounted");
                return Ok(path.clone());
            }
            if check_owed {
                UpdatePolicy::Force
            } else {
                UpdatePolicy::DontForce
            }
        };

        tracing::debug!(?policy, "Loading runtime component");

        match self.inner.clients.component.load(policy).await {
            Ok(path) => {
                let mut state = self.inner.state.lock();
                if policy == UpdatePolicy::Force {
                    tracing::debug!("Runtime component update check successful");
                    state.component.update_check_needed = false;
                }
                state.component.mounted_path = Some(path.clone());
                tracing::info!(path = %path.display(), "Runtime component ready");
                Ok(path)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install the runtime component");
                Err(VmError::ComponentLoadFailed(e.to_string()))
            }
        }
    }

    /// Request an upstream freshness check of the runtime component.
    ///
    /// When online, the check runs in the background right away; otherwise
    /// it is deferred to the next [`ensure_runtime_component`](Self::ensure_runtime_component)
    /// call made while online.
    pub fn maybe_upgrade_runtime_component(&self) {
        self.inner.state.lock().component.update_check_needed = true;

        if !self.inner.clients.component.is_online() {
            tracing::debug!("Offline, deferring runtime component upgrade check");
            return;
        }

        let manager = self.clone();
        self.inner.runner.spawn(async move {
            if let Err(e) = manager.ensure_runtime_component().await {
                tracing::warn!(error = %e, "Background runtime component upgrade failed");
            }
        });
    }

    /// Start the privileged VM service and wait for both it and the
    /// container service to announce availability.
    ///
    /// Fails as a whole if any of the three steps fails.
    pub async fn start_host_service(&self) -> VmResult<()> {
        tracing::debug!("Starting VM service");
        if !self.inner.clients.host.start_vm_service().await {
            tracing::error!("Failed to start VM service");
            return Err(VmError::HostServiceUnavailable(
                "failed to start VM service".into(),
            ));
        }

        tracing::debug!("VM service started, waiting for it to announce availability");
        if !self.inner.clients.vm.wait_for_service_available().await {
            tracing::error!("VM service did not become available");
            return Err(VmError::HostServiceUnavailable(
                "VM service did not become available".into(),
            ));
        }

        tracing::debug!("Waiting for container service to announce availability");
        if !self.inner.clients.container.wait_for_service_available().await {
            tracing::error!("Container service did not become available");
            return Err(VmError::HostServiceUnavailable(
                "container service did not become available".into(),
            ));
        }

        tracing::info!("Host services available");
        Ok(())
    }

    pub async fn stop_host_service(&self) -> VmResult<()> {
        tracing::debug!("Stopping VM service");
        if !self.inner.clients.host.stop_vm_service().await {
            tracing::error!("Failed to stop VM service");
            return Err(VmError::HostServiceUnavailable(
                "failed to stop VM service".into(),
            ));
        }
        tracing::info!("VM service stopped");
        Ok(())
    }
}
