//! Task: Host service.
//!
//! Starts the VM service and waits until both services are available.

use super::{log_task_error, task_start};
use crate::errors::VmResult;
use crate::pipeline::PipelineTask;
use crate::restart::context::RestartCtx;
use async_trait::async_trait;

pub(crate) struct HostServiceTask;

#[async_trait]
impl PipelineTask<RestartCtx> for HostServiceTask {
    async fn run(self: Box<Self>, ctx: RestartCtx) -> VmResult<()> {
        let task_name = self.name();
        let (id, manager) = task_start(&ctx, task_name).await;

        manager
            .start_host_service()
            .await
            .inspect_err(|e| log_task_error(id, task_name, e))
    }

    fn name(&self) -> &str {
        "host_service_start"
    }
}
