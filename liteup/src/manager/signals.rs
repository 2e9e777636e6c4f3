//! Routing of pushed service signals.
//!
//! Signals are not correlated 1:1 with requests. Each handler collects the
//! matching entries, erases them while holding the state lock, then invokes
//! them after the lock is released so a callback may call back into the
//! manager.

use super::Manager;
use crate::errors::VmError;
use crate::service::{InstallProgressSignal, InstallProgressStatus, ServiceSignal};
use crate::types::{ContainerKey, OwnerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Invoked once when the container it was registered for shuts down.
pub type ShutdownCallback = Box<dyn FnOnce() + Send>;

/// Receives package install progress for one owner.
pub trait InstallProgressObserver: Send + Sync {
    fn on_install_progress(
        &self,
        container: &ContainerKey,
        status: InstallProgressStatus,
        progress_percent: u8,
        failure_details: &str,
    );
}

impl Manager {
    /// Route one service signal to its handler.
    pub fn handle_signal(&self, signal: ServiceSignal) {
        match signal {
            ServiceSignal::ContainerStarted(key) => self.on_container_started(&key),
            ServiceSignal::ContainerStartupFailed(key) => self.on_container_startup_failed(&key),
            ServiceSignal::ContainerShutdown(key) => self.on_container_shutdown(&key),
            ServiceSignal::InstallPackageProgress(signal) => {
                self.on_install_package_progress(&signal)
            }
        }
    }

    /// Drain `signals` on the control context until every sender is gone.
    pub fn spawn_signal_listener(
        &self,
        mut signals: mpsc::UnboundedReceiver<ServiceSignal>,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        self.inner.runner.spawn(async move {
            while let Some(signal) = signals.recv().await {
                tracing::trace!(?signal, "Received service signal");
                manager.handle_signal(signal);
            }
            tracing::debug!("Service signal channel closed");
        })
    }

    /// The container is up. Resolves every pending start for `key`.
    pub fn on_container_started(&self, key: &ContainerKey) {
        let pending = {
            let mut state = self.inner.state.lock();
            state
                .running_containers
                .entry(key.vm_key())
                .or_default()
                .insert(key.container_name.clone());
            state.pending_starts.remove(key).unwrap_or_default()
        };

        tracing::info!(container = %key, waiters = pending.len(), "Container started");
        for tx in pending {
            // The waiter may have been dropped; nothing to resolve then.
            let _ = tx.send(Ok(()));
        }
    }

    /// The container failed to come up. Running sets are left untouched.
    pub fn on_container_startup_failed(&self, key: &ContainerKey) {
        let pending = self
            .inner
            .state
            .lock()
            .pending_starts
            .remove(key)
            .unwrap_or_default();

        tracing::error!(container = %key, waiters = pending.len(), "Container startup failed");
        for tx in pending {
            let _ = tx.send(Err(VmError::ContainerStartFailed(format!(
                "container {key} failed to start"
            ))));
        }
    }

    /// Fire shutdown interest for `key`.
    ///
    /// The container stays in the running set; only a VM stop removes it.
    pub fn on_container_shutdown(&self, key: &ContainerKey) {
        let callbacks = self
            .inner
            .state
            .lock()
            .shutdown_callbacks
            .remove(key)
            .unwrap_or_default();

        tracing::info!(container = %key, callbacks = callbacks.len(), "Container shut down");
        for callback in callbacks {
            callback();
        }
    }

    pub fn on_install_package_progress(&self, signal: &InstallProgressSignal) {
        let percent = match u8::try_from(signal.progress_percent) {
            Ok(percent) if percent <= 100 => percent,
            _ => {
                tracing::warn!(
                    container = %signal.container,
                    progress_percent = signal.progress_percent,
                    "Dropping install progress with out of range percent"
                );
                return;
            }
        };

        let observers = self
            .inner
            .state
            .lock()
            .install_observers
            .get(&signal.container.owner_id)
            .cloned()
            .unwrap_or_default();

        tracing::debug!(
            container = %signal.container,
            status = ?signal.status,
            percent,
            observers = observers.len(),
            "Install progress"
        );
        for observer in observers {
            observer.on_install_progress(
                &signal.container,
                signal.status,
                percent,
                &signal.failure_details,
            );
        }
    }

    /// Run `callback` once when `key` next shuts down.
    pub fn add_shutdown_container_callback(&self, key: ContainerKey, callback: ShutdownCallback) {
        self.inner
            .state
            .lock()
            .shutdown_callbacks
            .entry(key)
            .or_default()
            .push(callback);
    }

    pub fn add_install_progress_observer(
        &self,
        owner_id: &OwnerId,
        observer: Arc<dyn InstallProgressObserver>,
    ) {
        self.inner
            .state
            .lock()
            .install_observers
            .entry(owner_id.clone())
            .or_default()
            .push(observer);
    }

    /// Detach `observer`, compared by identity. Returns whether it was attached.
    pub fn remove_install_progress_observer(
        &self,
        owner_id: &OwnerId,
        observer: &Arc<dyn InstallProgressObserver>,
    ) -> bool {
        let mut state = self.inner.state.lock();
        let Some(observers) = state.install_observers.get_mut(owner_id) else {
            return false;
        };
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        let removed = observers.len() != before;
        if observers.is_empty() {
            state.install_observers.remove(owner_id);
        }
        removed
    }
}
