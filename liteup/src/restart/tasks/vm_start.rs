//! Task: VM start.
//!
//! Boots the VM from the disk image created by the previous step.

use super::{log_task_error, task_start};
use crate::errors::{VmError, VmResult};
use crate::pipeline::PipelineTask;
use crate::restart::context::RestartCtx;
use async_trait::async_trait;

pub(crate) struct VmStartTask;

#[async_trait]
impl PipelineTask<RestartCtx> for VmStartTask {
    async fn run(self: Box<Self>, ctx: RestartCtx) -> VmResult<()> {
        let task_name = self.name();
        let (id, manager) = task_start(&ctx, task_name).await;

        let (owner_id, vm_name, disk_path) = {
            let ctx = ctx.lock().await;
            let disk_path = ctx.disk_path.clone().ok_or_else(|| {
                VmError::VmStartFailed("disk_image task must run first".into())
            })?;
            (ctx.owner_id.clone(), ctx.vm_name.clone(), disk_path)
        };

        manager
            .start_vm(&owner_id, &vm_name, &disk_path)
            .await
            .inspect_err(|e| log_task_error(id, task_name, e))
    }

    fn name(&self) -> &str {
        "vm_start"
    }
}
