//! Task: Disk image.
//!
//! Creates (or reuses) the VM's disk image under the owner's storage root.
//! The image is named after the VM.

use super::{log_task_error, task_start};
use crate::errors::VmResult;
use crate::pipeline::PipelineTask;
use crate::restart::context::RestartCtx;
use crate::service::StorageLocation;
use async_trait::async_trait;
use std::path::PathBuf;

pub(crate) struct DiskImageTask;

#[async_trait]
impl PipelineTask<RestartCtx> for DiskImageTask {
    async fn run(self: Box<Self>, ctx: RestartCtx) -> VmResult<()> {
        let task_name = self.name();
        let (id, manager) = task_start(&ctx, task_name).await;

        let (owner_id, vm_name) = {
            let ctx = ctx.lock().await;
            (ctx.owner_id.clone(), ctx.vm_name.clone())
        };

        let disk_path = manager
            .create_disk_image(&owner_id, &PathBuf::from(vm_name), StorageLocation::Root)
            .await
            .inspect_err(|e| log_task_error(id, task_name, e))?;

        ctx.lock().await.disk_path = Some(disk_path);
        Ok(())
    }

    fn name(&self) -> &str {
        "disk_image_create"
    }
}
