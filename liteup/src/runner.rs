//! Control-context task runner.
//!
//! All Manager, restart and registry state is mutated from tasks spawned on
//! one `TaskRunner`. Hosting it on a current-thread tokio runtime gives the
//! cooperative single-threaded scheduling the bring-up flow is written for:
//! step N+1 is only issued after step N's future has resolved, and service
//! signals interleave with unrelated restarts only at `.await` points.
//!
//! Blocking work (the free disk space probe) must go through
//! [`TaskRunner::run_blocking`] so it never stalls the control context.

use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

#[derive(Clone, Debug)]
pub struct TaskRunner {
    handle: Handle,
}

impl TaskRunner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Runner bound to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Like [`current`](Self::current) but returns `None` outside a runtime.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Post a task onto the control context.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run blocking work on the blocking pool and await its result back on
    /// the control context.
    pub async fn run_blocking<F, R>(&self, f: F) -> Result<R, JoinError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(f).await
    }
}
