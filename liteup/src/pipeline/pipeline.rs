//! Generic pipeline execution framework.

use super::metrics::{PipelineMetrics, StepMetrics};
use super::task::BoxedTask;
use crate::errors::{VmError, VmResult};
use std::time::Instant;

/// Whether the chain should go on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Outcome of one task, handed to [`StepHook::after`].
#[derive(Debug)]
pub struct StepReport<'a> {
    pub index: usize,
    pub name: &'a str,
    pub result: &'a VmResult<()>,
    pub duration_ms: u128,
}

/// Hooks consulted around every task.
pub trait StepHook: Send {
    /// Called before task `index` runs. [`Flow::Stop`] skips it and all
    /// later tasks.
    fn before(&mut self, _index: usize, _name: &str) -> Flow {
        Flow::Continue
    }

    /// Called after a task resolves, before its failure (if any) ends the
    /// chain. [`Flow::Stop`] ends the chain without reporting the failure.
    fn after(&mut self, report: StepReport<'_>) -> Flow;
}

#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every task succeeded.
    Completed,
    /// A task failed; later tasks were skipped.
    Failed(VmError),
    /// The hook stopped the chain.
    Stopped,
}

#[derive(Debug)]
pub struct PipelineRun {
    pub outcome: PipelineOutcome,
    pub metrics: PipelineMetrics,
}

pub struct Pipeline<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx> Pipeline<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }
}

/// Pipeline executor framework.
///
/// This provides the generic infrastructure for executing a step chain.
/// The actual step logic is provided by task implementations.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a pipeline.
    ///
    /// Generic over:
    /// - `Ctx`: Shared pipeline context (use interior mutability for writes)
    pub async fn execute<Ctx, H>(pipeline: Pipeline<Ctx>, ctx: Ctx, hook: &mut H) -> PipelineRun
    where
        Ctx: Clone,
        H: StepHook + ?Sized,
    {
        let total_start = Instant::now();
        let mut steps = Vec::new();

        let outcome = 'chain: {
            for (index, task) in pipeline.tasks.into_iter().enumerate() {
                let name = task.name().to_string();

                if hook.before(index, &name) == Flow::Stop {
                    break 'chain PipelineOutcome::Stopped;
                }

                let task_start = Instant::now();
                let result = task.run(ctx.clone()).await;
                let duration_ms = task_start.elapsed().as_millis();

                let flow = hook.after(StepReport {
                    index,
                    name: &name,
                    result: &result,
                    duration_ms,
                });

                steps.push(StepMetrics {
                    index,
                    name,
                    duration_ms,
                });

                if flow == Flow::Stop {
                    break 'chain PipelineOutcome::Stopped;
                }
                if let Err(e) = result {
                    break 'chain PipelineOutcome::Failed(e);
                }
            }
            PipelineOutcome::Completed
        };

        PipelineRun {
            outcome,
            metrics: PipelineMetrics {
                total_duration_ms: total_start.elapsed().as_millis(),
                steps,
            },
        }
    }
}
