//! Task: Runtime component.
//!
//! Makes sure the VM runtime component is installed and mounted.

use super::{log_task_error, task_start};
use crate::errors::VmResult;
use crate::pipeline::PipelineTask;
use crate::restart::context::RestartCtx;
use async_trait::async_trait;

pub(crate) struct ComponentTask;

#[async_trait]
impl PipelineTask<RestartCtx> for ComponentTask {
    async fn run(self: Box<Self>, ctx: RestartCtx) -> VmResult<()> {
        let task_name = self.name();
        let (id, manager) = task_start(&ctx, task_name).await;

        manager
            .ensure_runtime_component()
            .await
            .inspect_err(|e| log_task_error(id, task_name, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "component_load"
    }
}
