//! Container start and container-scoped service calls.

use super::Manager;
use crate::errors::{VmError, VmResult};
use crate::service::{
    AppIcon, AppIconRequest, ContainerSshKeys, ContainerSshKeysRequest, ContainerStatus,
    InstallPackageRequest, InstallPackageStatus, LaunchApplicationRequest, StartContainerRequest,
};
use crate::types::{ContainerKey, OwnerId};
use tokio::sync::oneshot;

impl Manager {
    /// Start `container_name` inside a running VM.
    ///
    /// When the VM service answers "starting", the returned future stays
    /// pending until a container started or startup failed signal arrives
    /// for exactly this (owner, VM, container) triple.
    pub async fn start_container(
        &self,
        owner_id: &OwnerId,
        vm_name: &str,
        container_name: &str,
        container_username: &str,
    ) -> VmResult<()> {
        if owner_id.is_empty()
            || vm_name.is_empty()
            || container_name.is_empty()
            || container_username.is_empty()
        {
            return Err(VmError::client(
                "owner id, VM name, container name and user name are required",
            ));
        }
        self.check_container_signals()?;

        let key = ContainerKey::new(owner_id.clone(), vm_name, container_name);
        tracing::debug!(container = %key, container_username, "Starting container");

        let request = StartContainerRequest {
            owner_id: owner_id.clone(),
            vm_name: vm_name.to_string(),
            container_name: container_name.to_string(),
            container_username: container_username.to_string(),
        };

        // Parked before the call so a signal handled ahead of the reply
        // still finds the waiter.
        let rx = self.park_container_start(&key);

        let response = match self.inner.clients.vm.start_container(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(container = %key, error = %e, "Failed to start container");
                self.release_container_start(&key, rx);
                return Err(VmError::ContainerStartFailed(e.to_string()));
            }
        };

        match response.status {
            ContainerStatus::Running => {
                self.release_container_start(&key, rx);
                self.mark_container_running(&key);
                tracing::info!(container = %key, "Container running");
                Ok(())
            }
            ContainerStatus::Starting => {
                tracing::debug!(container = %key, "Awaiting container started signal");
                rx.await.unwrap_or_else(|_| {
                    Err(VmError::ContainerStartFailed(
                        "pending container start was dropped".into(),
                    ))
                })
            }
            ContainerStatus::Failed => {
                self.release_container_start(&key, rx);
                tracing::error!(
                    container = %key,
                    reason = %response.failure_reason,
                    "Failed to start container"
                );
                Err(VmError::ContainerStartFailed(response.failure_reason))
            }
        }
    }

    /// Launch the application described by `desktop_file_id`, optionally
    /// opening `files` (paths inside the container).
    pub async fn launch_container_application(
        &self,
        owner_id: &OwnerId,
        vm_name: &str,
        container_name: &str,
        desktop_file_id: &str,
        files: Vec<String>,
    ) -> VmResult<()> {
        if owner_id.is_empty() || vm_name.is_empty() || container_name.is_empty() {
            return Err(VmError::client(
                "owner id, VM name and container name are required",
            ));
        }
        if desktop_file_id.is_empty() {
            return Err(VmError::client("desktop file id is required"));
        }

        let request = LaunchApplicationRequest {
            owner_id: owner_id.clone(),
            vm_name: vm_name.to_string(),
            container_name: container_name.to_string(),
            desktop_file_id: desktop_file_id.to_string(),
            files,
        };

        let response = self
            .inner
            .clients
            .container
            .launch_container_application(request)
            .await
            .map_err(|e| {
                tracing::error!(desktop_file_id, error = %e, "Failed to launch application");
                VmError::LaunchApplicationFailed(e.to_string())
            })?;

        if !response.success {
            tracing::error!(
                desktop_file_id,
                reason = %response.failure_reason,
                "Failed to launch application"
            );
            return Err(VmError::LaunchApplicationFailed(response.failure_reason));
        }
        Ok(())
    }

    /// Fetch icons for `desktop_file_ids` at `size` pixels and `scale`.
    pub async fn get_container_app_icons(
        &self,
        owner_id: &OwnerId,
        vm_name: &str,
        container_name: &str,
        desktop_file_ids: Vec<String>,
        size: u32,
        scale: u32,
    ) -> VmResult<Vec<AppIcon>> {
        if owner_id.is_empty() || vm_name.is_empty() || container_name.is_empty() {
            return Err(VmError::client(
                "owner id, VM name and container name are required",
            ));
        }

        let request = AppIconRequest {
            owner_id: owner_id.clone(),
            vm_name: vm_name.to_string(),
            container_name: container_name.to_string(),
            desktop_file_ids,
            size,
            scale,
        };

        self.inner
            .clients
            .container
            .get_container_app_icons(request)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to get container app icons");
                VmError::ServiceCallFailed(e.to_string())
            })
    }

    /// Install the package at `file_path` (a path inside the container).
    ///
    /// Resolves once the install has been accepted. Progress and the final
    /// outcome arrive through install progress observers.
    pub async fn install_linux_package(
        &self,
        owner_id: &OwnerId,
        vm_name: &str,
        container_name: &str,
        file_path: &str,
    ) -> VmResult<()> {
        if owner_id.is_empty() || vm_name.is_empty() || container_name.is_empty() {
            return Err(VmError::client(
                "owner id, VM name and container name are required",
            ));
        }
        if file_path.is_empty() {
            return Err(VmError::client("package file path is required"));
        }
        if !self
            .inner
            .clients
            .container
            .is_install_package_progress_signal_connected()
        {
            tracing::error!("Install progress signal not connected, refusing package install");
            return Err(VmError::client("install progress signal is not connected"));
        }

        let request = InstallPackageRequest {
            owner_id: owner_id.clone(),
            vm_name: vm_name.to_string(),
            container_name: container_name.to_string(),
            file_path: file_path.to_string(),
        };

        let response = self
            .inner
            .clients
            .container
            .install_linux_package(request)
            .await
            .map_err(|e| {
                tracing::error!(file_path, error = %e, "Failed to install package");
                VmError::PackageInstallFailed(e.to_string())
            })?;

        match response.status {
            InstallPackageStatus::Started => {
                tracing::info!(file_path, "Package install started");
                Ok(())
            }
            InstallPackageStatus::AlreadyActive => {
                tracing::warn!(file_path, "A package install is already active");
                Err(VmError::PackageInstallAlreadyActive)
            }
            InstallPackageStatus::Failed => {
                tracing::error!(
                    file_path,
                    reason = %response.failure_reason,
                    "Failed to install package"
                );
                Err(VmError::PackageInstallFailed(response.failure_reason))
            }
        }
    }

    pub async fn get_container_ssh_keys(
        &self,
        owner_id: &OwnerId,
        vm_name: &str,
        container_name: &str,
    ) -> VmResult<ContainerSshKeys> {
        if owner_id.is_empty() || vm_name.is_empty() || container_name.is_empty() {
            return Err(VmError::client(
                "owner id, VM name and container name are required",
            ));
        }

        let request = ContainerSshKeysRequest {
            owner_id: owner_id.clone(),
            vm_name: vm_name.to_string(),
            container_name: container_name.to_string(),
        };

        self.inner
            .clients
            .vm
            .get_container_ssh_keys(request)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to get container SSH keys");
                VmError::ServiceCallFailed(e.to_string())
            })
    }

    /// A pending start could never resolve without all three lifecycle
    /// signals wired up.
    fn check_container_signals(&self) -> VmResult<()> {
        let clients = &self.inner.clients;
        let missing = [
            (
                "container startup failed",
                clients.vm.is_container_startup_failed_signal_connected(),
            ),
            (
                "container started",
                clients.container.is_container_started_signal_connected(),
            ),
            (
                "container shutdown",
                clients.container.is_container_shutdown_signal_connected(),
            ),
        ]
        .into_iter()
        .find(|(_, connected)| !connected);

        match missing {
            Some((signal, _)) => {
                tracing::error!(signal, "Container lifecycle signal not connected");
                Err(VmError::client(format!("{signal} signal is not connected")))
            }
            None => Ok(()),
        }
    }

    /// File a waiter for the container started/startup failed signals of
    /// `key`. Waiters whose start future was dropped are pruned first.
    fn park_container_start(&self, key: &ContainerKey) -> oneshot::Receiver<VmResult<()>> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.state.lock();
        let waiters = state.pending_starts.entry(key.clone()).or_default();
        waiters.retain(|waiter| !waiter.is_closed());
        waiters.push(tx);
        rx
    }

    /// Withdraw a waiter the reply made unnecessary.
    fn release_container_start(&self, key: &ContainerKey, rx: oneshot::Receiver<VmResult<()>>) {
        drop(rx);
        let mut state = self.inner.state.lock();
        if let Some(waiters) = state.pending_starts.get_mut(key) {
            waiters.retain(|waiter| !waiter.is_closed());
            if waiters.is_empty() {
                state.pending_starts.remove(key);
            }
        }
    }

    pub(super) fn mark_container_running(&self, key: &ContainerKey) {
        self.inner
            .state
            .lock()
            .running_containers
            .entry(key.vm_key())
            .or_default()
            .insert(key.container_name.clone());
    }
}
