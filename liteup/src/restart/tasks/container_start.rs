//! Task: Container start.
//!
//! Starts the named container and, when the VM service answers
//! "starting", waits for the container started signal.

use super::{log_task_error, task_start};
use crate::errors::VmResult;
use crate::pipeline::PipelineTask;
use crate::restart::context::RestartCtx;
use async_trait::async_trait;

pub(crate) struct ContainerStartTask;

#[async_trait]
impl PipelineTask<RestartCtx> for ContainerStartTask {
    async fn run(self: Box<Self>, ctx: RestartCtx) -> VmResult<()> {
        let task_name = self.name();
        let (id, manager) = task_start(&ctx, task_name).await;

        let (owner_id, vm_name, container_name, container_username) = {
            let ctx = ctx.lock().await;
            (
                ctx.owner_id.clone(),
                ctx.vm_name.clone(),
                ctx.container_name.clone(),
                ctx.container_username.clone(),
            )
        };

        manager
            .start_container(&owner_id, &vm_name, &container_name, &container_username)
            .await
            .inspect_err(|e| log_task_error(id, task_name, e))
    }

    fn name(&self) -> &str {
        "container_start"
    }
}
