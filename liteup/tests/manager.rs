//! Integration tests for the Manager against fake services.

mod common;

use common::{GIB, harness, harness_with, settle};
use liteup::service::{
    ContainerStatus, DiskImageStatus, InstallPackageStatus, InstallProgressSignal,
    InstallProgressStatus, ServiceSignal, StorageLocation, SuccessResponse, UpdatePolicy,
};
use liteup::{ContainerKey, ErrorCode, InstallProgressObserver, ManagerOptions, OwnerId, VmError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn owner() -> OwnerId {
    OwnerId::new("owner1")
}

// ============================================================================
// RUNTIME COMPONENT
// ============================================================================

#[tokio::test]
async fn test_component_forced_once_then_cached() {
    let h = harness();

    let path = h.manager.ensure_runtime_component().await.unwrap();
    assert_eq!(path, PathBuf::from("/run/component/vm-runtime"));
    h.manager.ensure_runtime_component().await.unwrap();

    assert_eq!(*h.backend.policies.lock(), vec![UpdatePolicy::Force]);
}

#[tokio::test]
async fn test_component_never_forced_offline() {
    let h = harness();
    h.backend.online.store(false, Ordering::SeqCst);

    h.manager.ensure_runtime_component().await.unwrap();
    assert_eq!(*h.backend.policies.lock(), vec![UpdatePolicy::DontForce]);

    // Still owed; forced as soon as the network is back.
    h.backend.online.store(true, Ordering::SeqCst);
    h.manager.ensure_runtime_component().await.unwrap();
    assert_eq!(
        *h.backend.policies.lock(),
        vec![UpdatePolicy::DontForce, UpdatePolicy::Force]
    );
}

#[tokio::test]
async fn test_maybe_upgrade_deferred_while_offline() {
    let h = harness();
    h.manager.ensure_runtime_component().await.unwrap();

    h.backend.online.store(false, Ordering::SeqCst);
    h.manager.maybe_upgrade_runtime_component();
    settle().await;
    assert_eq!(h.backend.count("component_load"), 1);

    // Offline: cached path, no reload.
    h.manager.ensure_runtime_component().await.unwrap();
    assert_eq!(h.backend.count("component_load"), 1);

    h.backend.online.store(true, Ordering::SeqCst);
    h.manager.maybe_upgrade_runtime_component();
    settle().await;
    assert_eq!(
        *h.backend.policies.lock(),
        vec![UpdatePolicy::Force, UpdatePolicy::Force]
    );
}

#[tokio::test]
async fn test_overlapping_component_loads_each_reach_loader() {
    let h = harness();
    let gate = h.backend.gate("component_load");

    let (a, b) = (h.manager.clone(), h.manager.clone());
    let first = tokio::spawn(async move { a.ensure_runtime_component().await });
    let second = tokio::spawn(async move { b.ensure_runtime_component().await });
    settle().await;
    assert_eq!(h.backend.count("component_load"), 2);

    gate.add_permits(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(
        *h.backend.policies.lock(),
        vec![UpdatePolicy::Force, UpdatePolicy::Force]
    );

    // The check is settled; later calls use the cached path.
    h.manager.ensure_runtime_component().await.unwrap();
    assert_eq!(h.backend.count("component_load"), 2);
}

#[tokio::test]
async fn test_component_load_failure() {
    let h = harness();
    *h.backend.component_result.lock() = Err(liteup::ServiceCallError::new(
        "component-updater",
        "Load",
        "download failed",
    ));

    let err = h.manager.ensure_runtime_component().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ComponentLoadFailed);
    assert!(err.reason().contains("download failed"));
}

// ============================================================================
// HOST SERVICE
// ============================================================================

#[tokio::test]
async fn test_host_service_waits_for_both_services() {
    let h = harness();
    h.manager.start_host_service().await.unwrap();
    assert_eq!(
        h.backend.calls(),
        vec![
            "start_vm_service",
            "vm_wait_available",
            "container_wait_available"
        ]
    );
}

#[tokio::test]
async fn test_host_service_start_failure_skips_waits() {
    let h = harness();
    h.backend.host_starts.store(false, Ordering::SeqCst);

    let err = h.manager.start_host_service().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::HostServiceUnavailable);
    assert_eq!(h.backend.calls(), vec!["start_vm_service"]);
}

#[tokio::test]
async fn test_host_service_vm_unavailable() {
    let h = harness();
    h.backend.vm_available.store(false, Ordering::SeqCst);

    let err = h.manager.start_host_service().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::HostServiceUnavailable);
    assert_eq!(h.backend.count("container_wait_available"), 0);
}

#[tokio::test]
async fn test_stop_host_service() {
    let h = harness();
    h.manager.stop_host_service().await.unwrap();
    assert_eq!(h.backend.calls(), vec!["stop_vm_service"]);
}

// ============================================================================
// DISK IMAGES
// ============================================================================

#[tokio::test]
async fn test_create_disk_reserves_ninety_percent() {
    let h = harness_with(ManagerOptions::default(), 10 * GIB);

    let path = h
        .manager
        .create_disk_image(&owner(), Path::new("vm1"), StorageLocation::Root)
        .await
        .unwrap();

    assert_eq!(path, PathBuf::from("/home/root/owner1/vm1.qcow2"));
    let requests = h.backend.disk_requests.lock();
    assert_eq!(requests[0].disk_size, 9 * GIB);
    assert_eq!(requests[0].storage_location, StorageLocation::Root);
}

#[tokio::test]
async fn test_create_disk_rejects_low_space() {
    let h = harness_with(ManagerOptions::default(), GIB);

    let err = h
        .manager
        .create_disk_image(&owner(), Path::new("vm1"), StorageLocation::Root)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ClientError);
    assert_eq!(h.backend.count("create_disk_image"), 0);
}

#[tokio::test]
async fn test_create_disk_dev_environment_ignores_minimum() {
    let h = harness_with(ManagerOptions::dev(), 0);

    h.manager
        .create_disk_image(&owner(), Path::new("vm1"), StorageLocation::Root)
        .await
        .unwrap();
    assert_eq!(h.backend.disk_requests.lock()[0].disk_size, 0);
}

#[tokio::test]
async fn test_create_disk_validation_makes_no_remote_call() {
    let h = harness();

    let cases = [
        (OwnerId::default(), "vm1", StorageLocation::Root),
        (owner(), "", StorageLocation::Root),
        (owner(), "vm1", StorageLocation::Unknown(42)),
    ];
    for (owner_id, path, location) in cases {
        let err = h
            .manager
            .create_disk_image(&owner_id, Path::new(path), location)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ClientError);
    }
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_create_disk_service_failure() {
    let h = harness();
    {
        let mut response = h.backend.create_disk.lock();
        response.status = DiskImageStatus::Failed;
        response.failure_reason = "quota exceeded".into();
    }

    let err = h
        .manager
        .create_disk_image(&owner(), Path::new("vm1"), StorageLocation::Downloads)
        .await
        .unwrap_err();
    assert_eq!(err, VmError::DiskCreateFailed("quota exceeded".into()));
}

#[tokio::test]
async fn test_destroy_missing_disk_is_success() {
    let h = harness();
    h.backend.destroy_disk.lock().status = DiskImageStatus::DoesNotExist;

    h.manager
        .destroy_disk_image(&owner(), Path::new("vm1"), StorageLocation::Root)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_vm_disks_total() {
    let h = harness();
    h.backend.list_disks.lock().total_size = 3 * GIB;

    assert_eq!(h.manager.list_vm_disks(&owner()).await.unwrap(), 3 * GIB);
    assert_eq!(
        h.manager
            .list_vm_disks(&OwnerId::default())
            .await
            .unwrap_err()
            .code(),
        ErrorCode::ClientError
    );
}

// ============================================================================
// VMS
// ============================================================================

#[tokio::test]
async fn test_start_vm_records_running() {
    let h = harness();
    h.manager
        .start_vm(&owner(), "vm1", Path::new("/disks/vm1"))
        .await
        .unwrap();
    assert!(h.manager.is_vm_running(&owner(), "vm1"));
    assert!(!h.manager.is_vm_running(&OwnerId::new("owner2"), "vm1"));
}

#[tokio::test]
async fn test_start_vm_failure_not_recorded() {
    let h = harness();
    *h.backend.start_vm.lock() = SuccessResponse::failed("no kvm");

    let err = h
        .manager
        .start_vm(&owner(), "vm1", Path::new("/disks/vm1"))
        .await
        .unwrap_err();
    assert_eq!(err, VmError::VmStartFailed("no kvm".into()));
    assert!(!h.manager.is_vm_running(&owner(), "vm1"));
}

#[tokio::test]
async fn test_start_vm_without_reply() {
    let h = harness();
    h.backend.no_reply.lock().push("start_vm");

    let err = h
        .manager
        .start_vm(&owner(), "vm1", Path::new("/disks/vm1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::VmStartFailed);
    assert!(err.reason().contains("vm-service"));
    assert!(!h.manager.is_vm_running(&owner(), "vm1"));
}

#[tokio::test]
async fn test_stop_missing_vm_is_success() {
    let h = harness();
    h.manager
        .start_vm(&owner(), "vm1", Path::new("/disks/vm1"))
        .await
        .unwrap();
    *h.backend.stop_vm.lock() = SuccessResponse::failed(liteup::manager::VM_DOES_NOT_EXIST);

    h.manager.stop_vm(&owner(), "vm1").await.unwrap();
    assert!(!h.manager.is_vm_running(&owner(), "vm1"));
}

#[tokio::test]
async fn test_stop_vm_failure_keeps_running() {
    let h = harness();
    h.manager
        .start_vm(&owner(), "vm1", Path::new("/disks/vm1"))
        .await
        .unwrap();
    *h.backend.stop_vm.lock() = SuccessResponse::failed("busy");

    let err = h.manager.stop_vm(&owner(), "vm1").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::VmStopFailed);
    assert!(h.manager.is_vm_running(&owner(), "vm1"));
}

#[tokio::test]
async fn test_stop_vm_clears_its_containers() {
    let h = harness();
    h.manager
        .start_vm(&owner(), "vm1", Path::new("/disks/vm1"))
        .await
        .unwrap();
    h.manager.on_container_started(&ContainerKey::new("owner1", "vm1", "c1"));
    h.manager.on_container_started(&ContainerKey::new("owner1", "vm1", "c2"));
    h.manager.on_container_started(&ContainerKey::new("owner1", "vm2", "c1"));

    h.manager.stop_vm(&owner(), "vm1").await.unwrap();

    assert!(!h.manager.is_container_running(&owner(), "vm1", "c1"));
    assert!(!h.manager.is_container_running(&owner(), "vm1", "c2"));
    assert!(h.manager.is_container_running(&owner(), "vm2", "c1"));
}

// ============================================================================
// CONTAINERS
// ============================================================================

#[tokio::test]
async fn test_start_container_requires_identifiers() {
    let h = harness();
    let err = h
        .manager
        .start_container(&owner(), "vm1", "c1", "")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ClientError);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn test_start_container_requires_signals() {
    let h = harness();
    h.backend.signals_connected.store(false, Ordering::SeqCst);

    let err = h
        .manager
        .start_container(&owner(), "vm1", "c1", "user1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ClientError);
    assert_eq!(h.backend.count("start_container"), 0);
}

#[tokio::test]
async fn test_pending_start_resolved_only_by_matching_signal() {
    let h = harness();
    h.backend.set_start_container_status(ContainerStatus::Starting);
    let key = ContainerKey::new("owner1", "vm1", "c1");

    let manager = h.manager.clone();
    let start = tokio::spawn(async move {
        manager
            .start_container(&OwnerId::new("owner1"), "vm1", "c1", "user1")
            .await
    });
    settle().await;
    assert_eq!(h.manager.pending_container_starts(&key), 1);

    h.manager.on_container_started(&ContainerKey::new("owner1", "vm1", "c2"));
    h.manager.on_container_started(&ContainerKey::new("owner2", "vm1", "c1"));
    settle().await;
    assert!(!start.is_finished());
    assert!(!h.manager.is_container_running(&owner(), "vm1", "c1"));

    h.manager.on_container_started(&key);
    assert_eq!(start.await.unwrap(), Ok(()));
    assert!(h.manager.is_container_running(&owner(), "vm1", "c1"));
    assert_eq!(h.manager.pending_container_starts(&key), 0);
}

#[tokio::test]
async fn test_pending_start_failed_signal() {
    let h = harness();
    h.backend.set_start_container_status(ContainerStatus::Starting);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    h.manager.spawn_signal_listener(rx);

    let manager = h.manager.clone();
    let start = tokio::spawn(async move {
        manager
            .start_container(&OwnerId::new("owner1"), "vm1", "c1", "user1")
            .await
    });
    settle().await;

    tx.send(ServiceSignal::ContainerStartupFailed(ContainerKey::new(
        "owner1", "vm1", "c1",
    )))
    .unwrap();

    let err = start.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContainerStartFailed);
    assert!(!h.manager.is_container_running(&owner(), "vm1", "c1"));
}

#[tokio::test]
async fn test_started_signal_during_start_call() {
    let h = harness();
    h.backend.set_start_container_status(ContainerStatus::Starting);
    let gate = h.backend.gate("start_container");
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    h.manager.spawn_signal_listener(rx);
    let key = ContainerKey::new("owner1", "vm1", "c1");

    let manager = h.manager.clone();
    let start = tokio::spawn(async move {
        manager
            .start_container(&OwnerId::new("owner1"), "vm1", "c1", "user1")
            .await
    });
    settle().await;
    assert_eq!(h.backend.count("start_container"), 1);
    assert_eq!(h.manager.pending_container_starts(&key), 1);

    // The signal overtakes the "starting" reply.
    tx.send(ServiceSignal::ContainerStarted(key.clone())).unwrap();
    settle().await;
    assert!(h.manager.is_container_running(&owner(), "vm1", "c1"));
    assert_eq!(h.manager.pending_container_starts(&key), 0);

    gate.add_permits(1);
    let result = tokio::time::timeout(Duration::from_secs(5), start)
        .await
        .expect("start_container should resolve")
        .unwrap();
    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn test_start_reply_withdraws_waiter() {
    let h = harness();
    let key = ContainerKey::new("owner1", "vm1", "c1");

    h.manager
        .start_container(&owner(), "vm1", "c1", "user1")
        .await
        .unwrap();
    assert_eq!(h.manager.pending_container_starts(&key), 0);

    h.backend.no_reply.lock().push("start_container");
    let err = h
        .manager
        .start_container(&owner(), "vm1", "c1", "user1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContainerStartFailed);
    assert_eq!(h.manager.pending_container_starts(&key), 0);
}

#[tokio::test]
async fn test_dropped_start_not_counted_as_pending() {
    let h = harness();
    h.backend.set_start_container_status(ContainerStatus::Starting);
    let key = ContainerKey::new("owner1", "vm1", "c1");

    let manager = h.manager.clone();
    let dropped = tokio::spawn(async move {
        manager
            .start_container(&OwnerId::new("owner1"), "vm1", "c1", "user1")
            .await
    });
    settle().await;
    assert_eq!(h.manager.pending_container_starts(&key), 1);

    dropped.abort();
    settle().await;
    assert_eq!(h.manager.pending_container_starts(&key), 0);

    let manager = h.manager.clone();
    let start = tokio::spawn(async move {
        manager
            .start_container(&OwnerId::new("owner1"), "vm1", "c1", "user1")
            .await
    });
    settle().await;
    assert_eq!(h.manager.pending_container_starts(&key), 1);

    h.manager.on_container_started(&key);
    assert_eq!(start.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_start_container_immediate_failure() {
    let h = harness();
    {
        let mut response = h.backend.start_container.lock();
        response.status = ContainerStatus::Failed;
        response.failure_reason = "no such container".into();
    }

    let err = h
        .manager
        .start_container(&owner(), "vm1", "c1", "user1")
        .await
        .unwrap_err();
    assert_eq!(err, VmError::ContainerStartFailed("no such container".into()));
    let key = ContainerKey::new("owner1", "vm1", "c1");
    assert_eq!(h.manager.pending_container_starts(&key), 0);
}

#[tokio::test]
async fn test_shutdown_callback_via_signal() {
    let h = harness();
    let key = ContainerKey::new("owner1", "vm1", "c1");
    let (tx, rx) = tokio::sync::oneshot::channel();

    h.manager.add_shutdown_container_callback(
        key.clone(),
        Box::new(move || {
            let _ = tx.send(());
        }),
    );
    h.manager.handle_signal(ServiceSignal::ContainerShutdown(key));

    rx.await.unwrap();
}

// ============================================================================
// APPS AND PACKAGES
// ============================================================================

#[tokio::test]
async fn test_launch_application() {
    let h = harness();
    h.manager
        .launch_container_application(&owner(), "vm1", "c1", "org.gnome.gedit", vec![])
        .await
        .unwrap();

    *h.backend.launch.lock() = SuccessResponse::failed("not installed");
    let err = h
        .manager
        .launch_container_application(&owner(), "vm1", "c1", "org.gnome.gedit", vec![])
        .await
        .unwrap_err();
    assert_eq!(err, VmError::LaunchApplicationFailed("not installed".into()));
}

#[tokio::test]
async fn test_app_icons_and_ssh_keys() {
    let h = harness();
    let icons = h
        .manager
        .get_container_app_icons(&owner(), "vm1", "c1", vec!["a".into(), "b".into()], 48, 2)
        .await
        .unwrap();
    assert_eq!(icons.len(), 2);
    assert_eq!(icons[1].desktop_file_id, "b");

    h.backend.ssh_keys.lock().hostname = "c1.vm1.local".into();
    let keys = h
        .manager
        .get_container_ssh_keys(&owner(), "vm1", "c1")
        .await
        .unwrap();
    assert_eq!(keys.hostname, "c1.vm1.local");
}

#[tokio::test]
async fn test_install_package_requires_progress_signal() {
    let h = harness();
    h.backend.progress_connected.store(false, Ordering::SeqCst);

    let err = h
        .manager
        .install_linux_package(&owner(), "vm1", "c1", "/tmp/pkg.deb")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ClientError);
    assert_eq!(h.backend.count("install_linux_package"), 0);
}

#[tokio::test]
async fn test_install_package_statuses() {
    let h = harness();
    h.manager
        .install_linux_package(&owner(), "vm1", "c1", "/tmp/pkg.deb")
        .await
        .unwrap();

    h.backend.install.lock().status = InstallPackageStatus::AlreadyActive;
    let err = h
        .manager
        .install_linux_package(&owner(), "vm1", "c1", "/tmp/pkg.deb")
        .await
        .unwrap_err();
    assert_eq!(err, VmError::PackageInstallAlreadyActive);

    {
        let mut response = h.backend.install.lock();
        response.status = InstallPackageStatus::Failed;
        response.failure_reason = "bad archive".into();
    }
    let err = h
        .manager
        .install_linux_package(&owner(), "vm1", "c1", "/tmp/pkg.deb")
        .await
        .unwrap_err();
    assert_eq!(err, VmError::PackageInstallFailed("bad archive".into()));
}

#[tokio::test]
async fn test_install_package_without_reply() {
    let h = harness();
    h.backend.no_reply.lock().push("install_linux_package");

    let err = h
        .manager
        .install_linux_package(&owner(), "vm1", "c1", "/tmp/pkg.deb")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PackageInstallFailed);
    assert!(err.reason().contains("container-service"));
}

#[derive(Default)]
struct ProgressRecorder {
    percents: Mutex<Vec<u8>>,
}

impl InstallProgressObserver for ProgressRecorder {
    fn on_install_progress(
        &self,
        _container: &ContainerKey,
        _status: InstallProgressStatus,
        progress_percent: u8,
        _failure_details: &str,
    ) {
        self.percents.lock().push(progress_percent);
    }
}

#[tokio::test]
async fn test_install_progress_bounds() {
    let h = harness();
    let recorder = Arc::new(ProgressRecorder::default());
    h.manager.add_install_progress_observer(&owner(), recorder.clone());

    for percent in [0, 42, 150, 100, -5] {
        h.manager
            .handle_signal(ServiceSignal::InstallPackageProgress(InstallProgressSignal {
                container: ContainerKey::new("owner1", "vm1", "c1"),
                status: InstallProgressStatus::Downloading,
                progress_percent: percent,
                failure_details: String::new(),
            }));
    }

    assert_eq!(*recorder.percents.lock(), vec![0, 42, 100]);
}
