//! Core identity types for VM and container bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// IDENTITY NEWTYPES
// ============================================================================

/// Opaque identity of the requesting account/profile.
///
/// Used only as a namespace for VM and container bookkeeping; never parsed.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies a running VM: (owner, VM name).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VmKey {
    pub owner_id: OwnerId,
    pub vm_name: String,
}

impl VmKey {
    pub fn new(owner_id: impl Into<OwnerId>, vm_name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            vm_name: vm_name.into(),
        }
    }
}

impl fmt::Display for VmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.vm_name)
    }
}

/// Identifies a container within a VM: (owner, VM name, container name).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerKey {
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
}

impl ContainerKey {
    pub fn new(
        owner_id: impl Into<OwnerId>,
        vm_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            vm_name: vm_name.into(),
            container_name: container_name.into(),
        }
    }

    /// The VM this container lives in.
    pub fn vm_key(&self) -> VmKey {
        VmKey::new(self.owner_id.clone(), self.vm_name.clone())
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.owner_id, self.vm_name, self.container_name
        )
    }
}

/// Dedup key of a bring-up target within one registry.
///
/// Deliberately excludes the owner: a registry is scoped to one owner, so
/// the owner is implicit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RestartKey {
    pub vm_name: String,
    pub container_name: String,
}

impl RestartKey {
    pub fn new(vm_name: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            vm_name: vm_name.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for RestartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vm_name, self.container_name)
    }
}

// ============================================================================
// RESTART ID
// ============================================================================

static NEXT_RESTART_ID: AtomicU64 = AtomicU64::new(0);

/// Caller-visible cancellation handle for one restart.
///
/// Process-wide and monotonically increasing, so ids from different
/// registries never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestartId(u64);

impl RestartId {
    /// Allocate the next id.
    pub(crate) fn next() -> Self {
        Self(NEXT_RESTART_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RestartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
