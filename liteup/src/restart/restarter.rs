//! One registered bring-up request, as stored in the registry arena.

use super::observer::RestartObserver;
use super::types::{RestartCallback, RestartInfo, RestartRequest, RestartState};
use crate::types::{OwnerId, RestartId, RestartKey};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub(crate) struct Restarter {
    pub id: RestartId,
    pub key: RestartKey,
    pub owner_id: OwnerId,
    pub container_username: String,
    pub state: RestartState,
    /// Drives the steps for its key; false while queued.
    pub active: bool,
    pub aborted: bool,
    pub observers: Vec<Arc<dyn RestartObserver>>,
    callback: Option<RestartCallback>,
    registered_at: DateTime<Utc>,
}

impl Restarter {
    pub fn new(id: RestartId, request: RestartRequest, callback: RestartCallback) -> Self {
        let key = request.key();
        Self {
            id,
            key,
            owner_id: request.owner_id,
            container_username: request.container_username,
            state: RestartState::Created,
            active: false,
            aborted: false,
            observers: request.observer.into_iter().collect(),
            callback: Some(callback),
            registered_at: Utc::now(),
        }
    }

    /// Take the terminal callback for invocation.
    pub fn take_callback(&mut self) -> Option<RestartCallback> {
        self.callback.take()
    }

    pub fn abort(&mut self) {
        self.aborted = true;
        self.state = RestartState::Aborted;
        self.observers.clear();
    }

    pub fn info(&self) -> RestartInfo {
        RestartInfo {
            id: self.id,
            key: self.key.clone(),
            owner_id: self.owner_id.clone(),
            state: self.state,
            active: self.active,
            registered_at: self.registered_at,
        }
    }
}

impl Drop for Restarter {
    fn drop(&mut self) {
        if self.callback.is_some() && !self.aborted {
            tracing::warn!(
                restart_id = %self.id,
                key = %self.key,
                state = %self.state,
                "Restarter destroyed before its result callback was invoked"
            );
        }
    }
}
