//! Steps of a restart.
//!
//! Each task reads what it needs from [`RestartCtx`] under the lock, releases
//! it, then awaits exactly one Manager operation.

mod component;
mod container_start;
mod disk_image;
mod host_service;
mod vm_start;

pub(crate) use component::ComponentTask;
pub(crate) use container_start::ContainerStartTask;
pub(crate) use disk_image::DiskImageTask;
pub(crate) use host_service::HostServiceTask;
pub(crate) use vm_start::VmStartTask;

use super::context::RestartCtx;
use crate::errors::VmError;
use crate::manager::Manager;
use crate::types::RestartId;

/// Log the start of a step. Returns the restart id and a manager handle.
async fn task_start(ctx: &RestartCtx, task_name: &str) -> (RestartId, Manager) {
    let ctx = ctx.lock().await;
    tracing::debug!(
        restart_id = %ctx.id,
        vm_name = %ctx.vm_name,
        container_name = %ctx.container_name,
        "Running {}",
        task_name
    );
    (ctx.id, ctx.manager.clone())
}

fn log_task_error(id: RestartId, task_name: &str, error: &VmError) {
    tracing::warn!(
        restart_id = %id,
        code = ?error.code(),
        "Step {} failed: {}",
        task_name,
        error
    );
}
