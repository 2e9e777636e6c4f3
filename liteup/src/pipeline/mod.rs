//! Sequential step-chain execution framework.
//!
//! ## Architecture
//!
//! ```text
//! Pipeline → Tasks (in order)
//!
//! - Pipeline: runs its tasks one after another against a shared context
//! - Task: atomic unit of work, one remote step
//! - StepHook: consulted around every task; may stop the chain
//! ```
//!
//! Task N+1 is never started before task N's future has resolved. After each
//! task the hook sees its outcome first; only then does a failure end the
//! chain. This ordering lets a hook report a failed step before the pipeline
//! itself resolves as failed, and lets it stop the chain silently.
//!
//! ## Example
//!
//! ```ignore
//! let pipeline = Pipeline::new(vec![Box::new(TaskA), Box::new(TaskB)]);
//! let ctx = Arc::new(Mutex::new(Context));
//! let run = PipelineExecutor::execute(pipeline, ctx, &mut hook).await;
//! println!("pipeline took {}ms", run.metrics.total_duration_ms);
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod task;

pub use metrics::{PipelineMetrics, StepMetrics};
pub use pipeline::{
    Flow, Pipeline, PipelineExecutor, PipelineOutcome, PipelineRun, StepHook, StepReport,
};
pub use task::{BoxedTask, PipelineTask};
