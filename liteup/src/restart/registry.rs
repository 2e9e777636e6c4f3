//! Per-owner restart registry.
//!
//! Maps each [`RestartKey`] to at most one actively stepping restart and an
//! ordered backlog of other registrations for the same key. When the active
//! restart finishes, every registration for the key gets its result. When
//! it is aborted, the oldest queued registration takes over.
//!
//! Restarts live in an arena keyed by [`RestartId`]. The step chain only
//! holds the id and a weak registry handle, and looks the entry up after
//! every step; a missing entry means the restart was aborted (or the
//! registry dropped) and the chain stops without resolving anything.

use super::context::{RestartContext, RestartCtx};
use super::observer::RestartObserver;
use super::restarter::Restarter;
use super::tasks::{ComponentTask, ContainerStartTask, DiskImageTask, HostServiceTask, VmStartTask};
use super::types::{RestartCallback, RestartInfo, RestartRequest, RestartState};
use crate::errors::{RegistryError, VmResult};
use crate::manager::Manager;
use crate::options::RestartOptions;
use crate::pipeline::{
    BoxedTask, Flow, Pipeline, PipelineExecutor, PipelineOutcome, StepHook, StepReport,
};
use crate::runner::TaskRunner;
use crate::types::{RestartId, RestartKey};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

// ============================================================================
// EXECUTION PLAN
// ============================================================================

/// Steps of a restart, in order, with the state each one runs in.
fn restart_plan() -> (Vec<RestartState>, Pipeline<RestartCtx>) {
    let states = vec![
        RestartState::ComponentLoading,
        RestartState::HostServiceStarting,
        RestartState::DiskCreating,
        RestartState::VmStarting,
        RestartState::ContainerStarting,
    ];
    let tasks: Vec<BoxedTask<RestartCtx>> = vec![
        Box::new(ComponentTask),
        Box::new(HostServiceTask),
        Box::new(DiskImageTask),
        Box::new(VmStartTask),
        Box::new(ContainerStartTask),
    ];
    (states, Pipeline::new(tasks))
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Default)]
struct RegistryState {
    restarters: HashMap<RestartId, Restarter>,
    /// Registrations per key in arrival order. The first one is active.
    pending: HashMap<RestartKey, Vec<RestartId>>,
}

struct RegistryInner {
    manager: Manager,
    runner: TaskRunner,
    options: RestartOptions,
    state: Mutex<RegistryState>,
}

/// Deduplicates concurrent bring-up requests within one owner scope.
///
/// Cheaply cloneable; clones share the same registrations.
#[derive(Clone)]
pub struct RestartRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for RestartRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RestartRegistry")
            .field("restarts", &state.restarters.len())
            .field("keys", &state.pending.len())
            .finish()
    }
}

impl RestartRegistry {
    pub fn new(manager: Manager, runner: TaskRunner, options: RestartOptions) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                manager,
                runner,
                options,
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// Register interest in bringing up `request`'s container.
    ///
    /// The first registration for a key starts stepping right away (on the
    /// runner, never inline). Later ones for the same key are queued and
    /// receive the active restart's result. `callback` runs at most once;
    /// it never runs if this registration is aborted.
    pub fn register(&self, request: RestartRequest, callback: RestartCallback) -> RestartId {
        let id = RestartId::next();
        let key = request.key();
        let mut restarter = Restarter::new(id, request, callback);

        let start = {
            let mut state = self.inner.state.lock();
            let ids = state.pending.entry(key.clone()).or_default();
            ids.push(id);
            let first = ids.len() == 1;
            restarter.active = first;
            state.restarters.insert(id, restarter);
            first
        };

        if start {
            tracing::debug!(restart_id = %id, key = %key, "Registered restart");
            self.inner.start(id);
        } else {
            tracing::debug!(restart_id = %id, key = %key, "Queued restart behind active one");
        }
        id
    }

    /// [`register`](Self::register) with the result delivered through a
    /// [`RestartHandle`].
    pub fn restart(&self, request: RestartRequest) -> RestartHandle {
        let (tx, rx) = oneshot::channel();
        let id = self.register(
            request,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        RestartHandle { id, result: rx }
    }

    /// Abort restart `id`. Returns whether it was still registered.
    ///
    /// The aborted registration's callback is dropped without being called.
    /// If it was the active restart for its key and others are queued, the
    /// oldest queued one starts stepping in its place. An unknown id is a
    /// benign race with completion and only logged.
    pub fn abort(&self, id: RestartId) -> bool {
        let (aborted, promoted) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let Some(mut restarter) = state.restarters.remove(&id) else {
                tracing::info!(restart_id = %id, "Abort of unknown restart, it may have finished");
                return false;
            };
            restarter.abort();

            let mut promoted = None;
            if let Some(ids) = state.pending.get_mut(&restarter.key) {
                ids.retain(|queued| *queued != id);
                match ids.first().copied() {
                    None => {
                        state.pending.remove(&restarter.key);
                    }
                    Some(next) if restarter.active => {
                        if let Some(next_restarter) = state.restarters.get_mut(&next) {
                            next_restarter.active = true;
                            promoted = Some(next);
                        }
                    }
                    Some(_) => {}
                }
            }
            (restarter, promoted)
        };

        tracing::info!(restart_id = %id, key = %aborted.key, "Aborted restart");
        drop(aborted);

        if let Some(next) = promoted {
            tracing::debug!(restart_id = %next, aborted = %id, "Promoted queued restart");
            self.inner.start(next);
        }
        true
    }

    /// Attach another observer to an actively stepping restart.
    pub fn add_observer(
        &self,
        id: RestartId,
        observer: Arc<dyn RestartObserver>,
    ) -> Result<(), RegistryError> {
        let mut state = self.inner.state.lock();
        let restarter = state
            .restarters
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        if !restarter.active {
            return Err(RegistryError::NotActive(id));
        }
        restarter.observers.push(observer);
        Ok(())
    }

    pub fn info(&self, id: RestartId) -> Option<RestartInfo> {
        self.inner
            .state
            .lock()
            .restarters
            .get(&id)
            .map(Restarter::info)
    }

    /// Restarts currently driving steps, ordered by id.
    pub fn active_restarts(&self) -> Vec<RestartInfo> {
        let state = self.inner.state.lock();
        let mut infos: Vec<_> = state
            .restarters
            .values()
            .filter(|r| r.active)
            .map(Restarter::info)
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Whether any registration for `key` is outstanding.
    pub fn is_restarting(&self, key: &RestartKey) -> bool {
        self.inner.state.lock().pending.contains_key(key)
    }
}

impl RegistryInner {
    fn start(self: &Arc<Self>, id: RestartId) {
        let registry = Arc::downgrade(self);
        self.runner.spawn(drive_restart(registry, id));
    }

    /// Resolve every registration sharing `id`'s key with `result`.
    ///
    /// All entries are erased before any callback runs, so a callback may
    /// register or abort re-entrantly.
    fn run_pending_callbacks(&self, id: RestartId, result: VmResult<()>) {
        let mut finished: Vec<Restarter> = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(key) = state.restarters.get(&id).map(|r| r.key.clone()) else {
                return;
            };
            state
                .pending
                .remove(&key)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|pending_id| state.restarters.remove(&pending_id))
                .collect()
        };

        let terminal = if result.is_ok() {
            RestartState::Succeeded
        } else {
            RestartState::Failed
        };
        let callbacks: Vec<_> = finished
            .iter_mut()
            .filter_map(|restarter| {
                restarter.state = terminal;
                restarter.take_callback()
            })
            .collect();
        drop(finished);

        tracing::debug!(
            restart_id = %id,
            callbacks = callbacks.len(),
            ok = result.is_ok(),
            "Running pending restart callbacks"
        );
        for callback in callbacks {
            callback(result.clone());
        }
    }

    /// Whether `id` is still registered and not aborted.
    fn is_live(&self, id: RestartId) -> bool {
        self.state
            .lock()
            .restarters
            .get(&id)
            .is_some_and(|r| !r.aborted)
    }
}

// ============================================================================
// STEP CHAIN
// ============================================================================

async fn drive_restart(registry: Weak<RegistryInner>, id: RestartId) {
    let (ctx, skip_restart) = {
        let Some(inner) = registry.upgrade() else {
            return;
        };
        let state = inner.state.lock();
        let Some(restarter) = state.restarters.get(&id).filter(|r| !r.aborted) else {
            return;
        };
        let ctx = RestartContext {
            id,
            manager: inner.manager.clone(),
            owner_id: restarter.owner_id.clone(),
            vm_name: restarter.key.vm_name.clone(),
            container_name: restarter.key.container_name.clone(),
            container_username: restarter.container_username.clone(),
            disk_path: None,
        };
        (ctx, inner.options.skip_restart)
    };

    if skip_restart {
        tracing::debug!(restart_id = %id, "Skipping restart");
        if let Some(inner) = registry.upgrade()
            && inner.is_live(id)
        {
            inner.run_pending_callbacks(id, Ok(()));
        }
        return;
    }

    let (states, pipeline) = restart_plan();
    let mut hook = RestartHook {
        registry: registry.clone(),
        id,
        states,
    };
    let ctx: RestartCtx = Arc::new(tokio::sync::Mutex::new(ctx));
    let run = PipelineExecutor::execute(pipeline, ctx, &mut hook).await;
    run.metrics.log_steps();

    let result = match run.outcome {
        PipelineOutcome::Completed => Ok(()),
        PipelineOutcome::Failed(e) => Err(e),
        PipelineOutcome::Stopped => {
            tracing::debug!(restart_id = %id, "Restart stopped after abort");
            return;
        }
    };

    match &result {
        Ok(()) => tracing::info!(
            restart_id = %id,
            total_duration_ms = run.metrics.total_duration_ms,
            "Restart succeeded"
        ),
        Err(e) => tracing::warn!(restart_id = %id, error = %e, "Restart failed"),
    }

    if let Some(inner) = registry.upgrade() {
        inner.run_pending_callbacks(id, result);
    }
}

/// Tracks state and notifies observers around each step.
struct RestartHook {
    registry: Weak<RegistryInner>,
    id: RestartId,
    states: Vec<RestartState>,
}

impl StepHook for RestartHook {
    fn before(&mut self, index: usize, _name: &str) -> Flow {
        let Some(inner) = self.registry.upgrade() else {
            return Flow::Stop;
        };
        let mut state = inner.state.lock();
        match state.restarters.get_mut(&self.id) {
            Some(restarter) if !restarter.aborted => {
                if let Some(step) = self.states.get(index) {
                    restarter.state = *step;
                }
                Flow::Continue
            }
            _ => Flow::Stop,
        }
    }

    fn after(&mut self, report: StepReport<'_>) -> Flow {
        let Some(inner) = self.registry.upgrade() else {
            return Flow::Stop;
        };
        let step = self
            .states
            .get(report.index)
            .copied()
            .unwrap_or(RestartState::Created);

        let observers = inner
            .state
            .lock()
            .restarters
            .get(&self.id)
            .map(|r| r.observers.clone())
            .unwrap_or_default();
        for observer in observers {
            observer.on_step_finished(self.id, step, report.result);
        }

        if inner.is_live(self.id) {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// A registration plus a future of its result.
///
/// Resolves to `None` if the registration was aborted (or its registry
/// dropped) before a result was delivered.
#[derive(Debug)]
pub struct RestartHandle {
    id: RestartId,
    result: oneshot::Receiver<VmResult<()>>,
}

impl RestartHandle {
    pub fn id(&self) -> RestartId {
        self.id
    }
}

impl Future for RestartHandle {
    type Output = Option<VmResult<()>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.result.poll_unpin(cx).map(Result::ok)
    }
}
