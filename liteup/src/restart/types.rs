//! Type definitions for restarts.

use super::observer::RestartObserver;
use crate::errors::VmResult;
use crate::types::{OwnerId, RestartId, RestartKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Terminal result handler for one registration. Invoked at most once.
pub type RestartCallback = Box<dyn FnOnce(VmResult<()>) + Send>;

/// Where a restart is in its step sequence.
///
/// ```text
/// Created → ComponentLoading → HostServiceStarting → DiskCreating
///         → VmStarting → ContainerStarting → {Succeeded | Failed | Aborted}
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestartState {
    /// Registered, not stepping yet (or queued behind another restart).
    Created,
    ComponentLoading,
    HostServiceStarting,
    DiskCreating,
    VmStarting,
    ContainerStarting,
    Succeeded,
    Failed,
    Aborted,
}

impl RestartState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ComponentLoading => "component_loading",
            Self::HostServiceStarting => "host_service_starting",
            Self::DiskCreating => "disk_creating",
            Self::VmStarting => "vm_starting",
            Self::ContainerStarting => "container_starting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RestartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to bring up, and who wants to watch.
#[derive(Clone)]
pub struct RestartRequest {
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
    pub container_username: String,
    pub(crate) observer: Option<Arc<dyn RestartObserver>>,
}

impl RestartRequest {
    pub fn new(
        owner_id: impl Into<OwnerId>,
        vm_name: impl Into<String>,
        container_name: impl Into<String>,
        container_username: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            vm_name: vm_name.into(),
            container_name: container_name.into(),
            container_username: container_username.into(),
            observer: None,
        }
    }

    /// Attach a step observer.
    ///
    /// If the request ends up queued behind an active restart, the observer
    /// is only notified if that restart is later promoted.
    pub fn with_observer(mut self, observer: Arc<dyn RestartObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn key(&self) -> RestartKey {
        RestartKey::new(self.vm_name.clone(), self.container_name.clone())
    }
}

impl fmt::Debug for RestartRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartRequest")
            .field("owner_id", &self.owner_id)
            .field("vm_name", &self.vm_name)
            .field("container_name", &self.container_name)
            .field("container_username", &self.container_username)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Snapshot of one registered restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartInfo {
    pub id: RestartId,
    pub key: RestartKey,
    pub owner_id: OwnerId,
    pub state: RestartState,
    /// Whether this restart drives the steps for its key (false when queued).
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}
