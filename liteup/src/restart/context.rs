//! Shared context of one restart's step chain.

use crate::manager::Manager;
use crate::types::{OwnerId, RestartId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Inputs to every step, plus outputs handed from one step to the next.
pub(crate) struct RestartContext {
    pub id: RestartId,
    pub manager: Manager,
    pub owner_id: OwnerId,
    pub vm_name: String,
    pub container_name: String,
    pub container_username: String,
    /// Set by the disk image step, consumed by the VM start step.
    pub disk_path: Option<PathBuf>,
}

pub(crate) type RestartCtx = Arc<Mutex<RestartContext>>;
