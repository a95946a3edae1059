//! Background execution of a bind.
//!
//! An [`AsyncBindTask`] moves through `Pending → Executing → {Completed |
//! Failed}`. Scheduling hands the blocking binder call to tokio's blocking
//! pool; awaiting [`ScheduledBind::outcome`] resumes on the awaiting context,
//! which is where the result is turned into a wrapper.
//!
//! The task owns the call's runtime lease from construction until delivery. If
//! nobody waits for the result, the lease is dropped on the worker after the
//! outcome, so an unclaimed object is released before any teardown.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::binder::{BindOutcome, ObjectBinder};
use crate::error::BindError;
use crate::request::BindingRequest;
use crate::runtime::RuntimeLease;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  Pending,
  Executing,
  Completed,
  Failed,
}

impl TaskState {
  pub fn is_terminal(self) -> bool {
    matches!(self, TaskState::Completed | TaskState::Failed)
  }
}

#[derive(Clone)]
struct SharedState(Arc<Mutex<TaskState>>);

impl SharedState {
  fn get(&self) -> TaskState {
    *self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn set(&self, state: TaskState) {
    *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
  }
}

pub struct AsyncBindTask {
  binder: ObjectBinder,
  request: BindingRequest,
  lease: RuntimeLease,
  state: SharedState,
}

impl AsyncBindTask {
  pub fn new(binder: ObjectBinder, request: BindingRequest, lease: RuntimeLease) -> Self {
    Self {
      binder,
      request,
      lease,
      state: SharedState(Arc::new(Mutex::new(TaskState::Pending))),
    }
  }

  pub fn state(&self) -> TaskState {
    self.state.get()
  }

  /// Discard the task. The binder is never invoked.
  pub fn cancel(self) {
    debug!(binding = %self.request.target_uri(), "bind cancelled before scheduling");
  }

  /// Hand the bind to the blocking pool of the current tokio runtime.
  ///
  /// Fails without invoking the binder when called outside a runtime.
  pub fn schedule(self) -> Result<ScheduledBind, BindError> {
    let runtime = Handle::try_current()
      .map_err(|e| BindError::ProcessState(format!("asynchronous bind needs a tokio runtime: {}", e)))?;

    let AsyncBindTask {
      binder,
      request,
      lease,
      state,
    } = self;
    let binding = request.target_uri().to_string();
    state.set(TaskState::Executing);
    debug!(binding = %binding, "bind scheduled");

    let worker_state = state.clone();
    let join = runtime.spawn_blocking(move || {
      let outcome = binder.bind(&request, &lease);
      worker_state.set(if outcome.is_ok() {
        TaskState::Completed
      } else {
        TaskState::Failed
      });
      Delivery { outcome, lease }
    });

    Ok(ScheduledBind { join, state, binding })
  }
}

/// A finished bind and the lease of the call that produced it.
///
/// `outcome` is declared first so it drops before `lease`.
pub struct Delivery {
  pub outcome: BindOutcome,
  pub lease: RuntimeLease,
}

/// A bind running on the blocking pool.
pub struct ScheduledBind {
  join: JoinHandle<Delivery>,
  state: SharedState,
  binding: String,
}

impl ScheduledBind {
  pub fn state(&self) -> TaskState {
    self.state.get()
  }

  /// Wait for the worker and take its outcome.
  pub async fn outcome(self) -> Result<Delivery, BindError> {
    let delivery = self
      .join
      .await
      .map_err(|e| BindError::ProcessState(format!("bind worker for '{}' terminated: {}", self.binding, e)))?;
    debug!(binding = %self.binding, state = ?self.state.get(), "bind delivered");
    Ok(delivery)
  }

  /// Stop waiting for the result. The foreign call cannot be interrupted; it
  /// runs to completion and any object it returns is released.
  pub fn abandon(self) {
    let state = self.state.get();
    warn!(binding = %self.binding, state = ?state, finished = state.is_terminal(), "bind abandoned");
  }
}
