//! Error types for liteup.
//!
//! Every asynchronous [`Manager`](crate::Manager) operation resolves to a
//! [`VmResult`]. The failure side is a closed set: one variant per failure
//! kind, each carrying the human-readable reason reported by the service (or
//! by client-side validation). Success is simply `Ok(..)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RestartId;

/// Result type for Manager and restart operations.
pub type VmResult<T> = Result<T, VmError>;

/// Closed failure taxonomy for VM and container bring-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Request rejected before any remote call (empty identifiers,
    /// unsupported storage location, missing signal wiring, low disk space).
    #[error("client error: {0}")]
    ClientError(String),

    /// The VM runtime component could not be installed or mounted.
    #[error("runtime component load failed: {0}")]
    ComponentLoadFailed(String),

    /// The privileged host service or its companion never became available.
    #[error("host service unavailable: {0}")]
    HostServiceUnavailable(String),

    #[error("disk image creation failed: {0}")]
    DiskCreateFailed(String),

    #[error("disk image destruction failed: {0}")]
    DiskDestroyFailed(String),

    #[error("listing VM disks failed: {0}")]
    ListVmDisksFailed(String),

    #[error("VM start failed: {0}")]
    VmStartFailed(String),

    #[error("VM stop failed: {0}")]
    VmStopFailed(String),

    #[error("container start failed: {0}")]
    ContainerStartFailed(String),

    #[error("application launch failed: {0}")]
    LaunchApplicationFailed(String),

    #[error("package install failed: {0}")]
    PackageInstallFailed(String),

    #[error("package install already active")]
    PackageInstallAlreadyActive,

    /// A request/response call that has no dedicated failure kind got no
    /// usable reply.
    #[error("service call failed: {0}")]
    ServiceCallFailed(String),
}

/// Discriminant of [`VmError`], without the reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    ClientError,
    ComponentLoadFailed,
    HostServiceUnavailable,
    DiskCreateFailed,
    DiskDestroyFailed,
    ListVmDisksFailed,
    VmStartFailed,
    VmStopFailed,
    ContainerStartFailed,
    LaunchApplicationFailed,
    PackageInstallFailed,
    PackageInstallAlreadyActive,
    ServiceCallFailed,
}

impl VmError {
    /// Shorthand for a client-side validation failure.
    pub fn client(reason: impl Into<String>) -> Self {
        Self::ClientError(reason.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ClientError(_) => ErrorCode::ClientError,
            Self::ComponentLoadFailed(_) => ErrorCode::ComponentLoadFailed,
            Self::HostServiceUnavailable(_) => ErrorCode::HostServiceUnavailable,
            Self::DiskCreateFailed(_) => ErrorCode::DiskCreateFailed,
            Self::DiskDestroyFailed(_) => ErrorCode::DiskDestroyFailed,
            Self::ListVmDisksFailed(_) => ErrorCode::ListVmDisksFailed,
            Self::VmStartFailed(_) => ErrorCode::VmStartFailed,
            Self::VmStopFailed(_) => ErrorCode::VmStopFailed,
            Self::ContainerStartFailed(_) => ErrorCode::ContainerStartFailed,
            Self::LaunchApplicationFailed(_) => ErrorCode::LaunchApplicationFailed,
            Self::PackageInstallFailed(_) => ErrorCode::PackageInstallFailed,
            Self::PackageInstallAlreadyActive => ErrorCode::PackageInstallAlreadyActive,
            Self::ServiceCallFailed(_) => ErrorCode::ServiceCallFailed,
        }
    }

    /// The reason string carried by this error, if any.
    pub fn reason(&self) -> &str {
        match self {
            Self::ClientError(r)
            | Self::ComponentLoadFailed(r)
            | Self::HostServiceUnavailable(r)
            | Self::DiskCreateFailed(r)
            | Self::DiskDestroyFailed(r)
            | Self::ListVmDisksFailed(r)
            | Self::VmStartFailed(r)
            | Self::VmStopFailed(r)
            | Self::ContainerStartFailed(r)
            | Self::LaunchApplicationFailed(r)
            | Self::PackageInstallFailed(r)
            | Self::ServiceCallFailed(r) => r,
            Self::PackageInstallAlreadyActive => "",
        }
    }
}

/// Transport-level failure of a single service call (no reply, broken
/// channel). Manager maps it into the [`VmError`] kind of the calling step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} call {method} failed: {message}")]
pub struct ServiceCallError {
    pub service: &'static str,
    pub method: &'static str,
    pub message: String,
}

impl ServiceCallError {
    pub fn new(service: &'static str, method: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            method,
            message: message.into(),
        }
    }

    /// The call returned no response at all.
    pub fn empty_response(service: &'static str, method: &'static str) -> Self {
        Self::new(service, method, "empty response")
    }
}

/// Misuse of the restart registry API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The restart id is unknown: never issued, already resolved, or aborted.
    #[error("restart {0} not found")]
    NotFound(RestartId),

    /// The restart is queued behind another one for the same target and is
    /// not stepping, so an observer attached to it would never be notified.
    #[error("restart {0} is queued and not actively stepping")]
    NotActive(RestartId),
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}
