use super::types::RestartState;
use crate::errors::VmResult;
use crate::types::RestartId;

/// Watches the steps of one restart.
///
/// Notified synchronously on the control context after every step, failed
/// steps included. An aborted restart notifies no one.
pub trait RestartObserver: Send + Sync {
    /// `step` is the state the restart was in while the step ran.
    fn on_step_finished(&self, id: RestartId, step: RestartState, result: &VmResult<()>);
}
