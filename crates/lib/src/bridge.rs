//! The bind pipeline: validate, bind, then translate or dispatch.
//!
//! Both execution strategies produce a [`BindOutcome`] and hand it to the same
//! completion step, so translation and dispatch exist once.
//!
//! Each call holds a runtime lease until its outcome is translated or
//! dispatched, and every bound object carries a share of it, so the runtime
//! stays up for as long as any wrapper is alive.

use std::sync::Arc;

use tracing::{info, warn};

use crate::binder::{BindOutcome, ObjectBinder};
use crate::dispatch::{CapabilityDispatcher, CapabilityWrapper};
use crate::error::{self, BindError, Operation};
use crate::provider::DirectoryProvider;
use crate::request::BindingRequest;
use crate::runtime::{ProcessRuntime, RuntimeLease};
use crate::task::{AsyncBindTask, Delivery};

pub struct Bridge {
  binder: ObjectBinder,
  runtime: Arc<ProcessRuntime>,
}

impl Bridge {
  pub fn new(provider: Arc<dyn DirectoryProvider>) -> Self {
    Self {
      runtime: ProcessRuntime::new(provider.clone()),
      binder: ObjectBinder::new(provider),
    }
  }

  pub fn provider_name(&self) -> &'static str {
    self.binder.provider().name()
  }

  pub fn runtime(&self) -> &Arc<ProcessRuntime> {
    &self.runtime
  }

  /// A lease meant to be held for the lifetime of the process or Lua state.
  pub fn session(&self) -> Result<RuntimeLease, BindError> {
    self.runtime.acquire()
  }

  /// Bind on the calling thread, blocking it for the foreign call.
  pub fn open_blocking(&self, operation: Operation, request: BindingRequest) -> Result<CapabilityWrapper, BindError> {
    let lease = self.runtime.acquire()?;
    info!(operation = %operation, binding = %request.target_uri(), capability = %request.capability(), "binding");
    let outcome = self.binder.bind(&request, &lease);
    let result = self.complete(operation, &request, outcome);
    drop(lease);
    result
  }

  /// Bind on the blocking pool and resume on the awaiting context.
  pub async fn open(&self, operation: Operation, request: BindingRequest) -> Result<CapabilityWrapper, BindError> {
    let lease = self.runtime.acquire()?;
    info!(
      operation = %operation,
      binding = %request.target_uri(),
      capability = %request.capability(),
      "binding in background"
    );
    let scheduled = AsyncBindTask::new(self.binder.clone(), request.clone(), lease).schedule()?;
    let Delivery { outcome, lease } = scheduled.outcome().await?;
    let result = self.complete(operation, &request, outcome);
    drop(lease);
    result
  }

  /// Turn an outcome into a wrapper or a translated error. Callers keep the
  /// call's lease alive until this returns.
  fn complete(
    &self,
    operation: Operation,
    request: &BindingRequest,
    outcome: BindOutcome,
  ) -> Result<CapabilityWrapper, BindError> {
    match outcome {
      Ok(handle) => {
        let wrapper = CapabilityDispatcher::dispatch(handle);
        info!(
          operation = %operation,
          binding = %request.target_uri(),
          wrapper = wrapper.type_name(),
          handle = %wrapper.object().id(),
          "bind succeeded"
        );
        Ok(wrapper)
      }
      Err(status) => {
        let err = error::translate(operation, &status, self.binder.provider().as_ref());
        warn!(operation = %operation, binding = %request.target_uri(), status = %status, "bind failed");
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;
  use std::time::Duration;

  use tracing_test::traced_test;

  use crate::provider::memory::{DirectoryEntry, MemoryProvider};
  use crate::status::E_ADS_BAD_PATHNAME;

  const TARGET: &str = "LDAP://server/CN=x,DC=y";

  fn bridge(provider: MemoryProvider) -> (Arc<MemoryProvider>, Bridge) {
    let provider = Arc::new(provider);
    (provider.clone(), Bridge::new(provider))
  }

  #[test]
  fn sync_generic_scenario() {
    let (provider, bridge) = bridge(MemoryProvider::open_directory());
    let wrapper = bridge
      .open_blocking(Operation::OpenObject, BindingRequest::new(TARGET).unwrap())
      .unwrap();
    assert_eq!(wrapper.type_name(), "GenericWrapper");
    assert_eq!(wrapper.object().id(), "0x0000000000001000");
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.releases(), 0);
    drop(wrapper);
    assert_eq!(provider.releases(), 1);
  }

  #[tokio::test]
  async fn async_failure_scenario() {
    let (provider, bridge) = bridge(MemoryProvider::open_directory().with_failures(|_| Some(E_ADS_BAD_PATHNAME)));
    let request = BindingRequest::new(TARGET)
      .unwrap()
      .with_capability(crate::request::Capability::DirectorySearch);
    let err = bridge.open(Operation::OpenObject, request).await.unwrap_err();

    let text = err.to_string();
    assert!(text.starts_with("error in ADsOpenObject: "), "{}", text);
    assert!(!text.contains("DirectorySearch"), "{}", text);
    assert!(text.contains("An invalid directory pathname was passed"), "{}", text);
    assert_eq!(err.native_code(), Some(E_ADS_BAD_PATHNAME));
    assert_eq!(provider.live_objects(), 0);
    assert_eq!(provider.releases(), 0);
  }

  #[test]
  fn failed_call_does_not_tear_down_session() {
    let (provider, bridge) = bridge(MemoryProvider::new(vec![DirectoryEntry::new(TARGET)]));
    let _session = bridge.session().unwrap();

    let err = bridge
      .open_blocking(Operation::GetObject, BindingRequest::new("LDAP://server/CN=missing").unwrap())
      .unwrap_err();
    assert!(err.to_string().starts_with("error in ADsGetObject: "));
    assert!(provider.is_initialized());
    assert_eq!(bridge.runtime().lease_count(), 1);

    let wrapper = bridge
      .open_blocking(Operation::GetObject, BindingRequest::new(TARGET).unwrap())
      .unwrap();
    assert_eq!(wrapper.type_name(), "GenericWrapper");
    assert_eq!(provider.initializations(), 1);
  }

  #[test]
  fn wrapper_keeps_runtime_up_without_session() {
    let (provider, bridge) = bridge(MemoryProvider::open_directory());
    let wrapper = bridge
      .open_blocking(Operation::OpenObject, BindingRequest::new(TARGET).unwrap())
      .unwrap();
    assert_eq!(provider.initializations(), 1);
    assert!(provider.is_initialized(), "a live wrapper must keep the runtime up");
    assert_eq!(bridge.runtime().lease_count(), 1);

    drop(wrapper);
    assert!(!provider.is_initialized());
    assert_eq!(bridge.runtime().lease_count(), 0);
    assert_eq!(provider.releases(), 1);
    assert_eq!(provider.releases_after_teardown(), 0);
  }

  #[tokio::test]
  async fn async_wrapper_keeps_runtime_up_without_session() {
    let (provider, bridge) = bridge(MemoryProvider::open_directory());
    let wrapper = bridge
      .open(Operation::OpenObject, BindingRequest::new(TARGET).unwrap())
      .await
      .unwrap();
    assert!(provider.is_initialized());

    drop(wrapper);
    assert!(!provider.is_initialized());
    assert_eq!(provider.releases_after_teardown(), 0);
  }

  #[test]
  fn failed_call_without_session_tears_down_once() {
    let (provider, bridge) = bridge(MemoryProvider::open_directory());
    let err = bridge
      .open_blocking(Operation::OpenObject, BindingRequest::new("nonsense").unwrap())
      .unwrap_err();
    assert_eq!(err.native_code(), Some(E_ADS_BAD_PATHNAME));
    assert_eq!(provider.initializations(), 1);
    assert!(!provider.is_initialized());
    assert_eq!(bridge.runtime().lease_count(), 0);
  }

  #[tokio::test]
  async fn dropped_bind_future_releases_before_teardown() {
    let (provider, bridge) = bridge(MemoryProvider::open_directory().with_latency(Duration::from_millis(50)));
    let request = BindingRequest::new(TARGET).unwrap();
    let timed_out = tokio::time::timeout(Duration::from_millis(5), bridge.open(Operation::OpenObject, request)).await;
    assert!(timed_out.is_err());
    assert!(provider.is_initialized(), "the running worker still owns the call's lease");

    for _ in 0..200 {
      if provider.releases() == 1 && !provider.is_initialized() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.releases(), 1);
    assert!(!provider.is_initialized());
    assert_eq!(provider.releases_after_teardown(), 0);
  }

  #[tokio::test]
  async fn concurrent_binds_resolve_independently() {
    let (provider, bridge) = bridge(
      MemoryProvider::open_directory()
        .with_latency(Duration::from_millis(20))
        .with_failing_bindings(|binding| {
          let index: usize = binding.strip_prefix("LDAP://server/CN=obj")?.split(',').next()?.parse().ok()?;
          (index % 2 == 0).then_some(E_ADS_BAD_PATHNAME)
        }),
    );
    let bridge = Arc::new(bridge);
    let _session = bridge.session().unwrap();
    let origin = std::thread::current().id();

    let local = tokio::task::LocalSet::new();
    let results = local
      .run_until(async {
        let mut tasks = Vec::new();
        for i in 0..8usize {
          let bridge = bridge.clone();
          tasks.push(tokio::task::spawn_local(async move {
            let request = BindingRequest::new(format!("LDAP://server/CN=obj{},DC=y", i)).unwrap();
            let result = bridge.open(Operation::OpenObject, request).await;
            (i, std::thread::current().id(), result)
          }));
        }
        let mut results = Vec::new();
        for task in tasks {
          results.push(task.await.unwrap());
        }
        results
      })
      .await;

    let mut ok_ids = HashSet::new();
    for (i, thread, result) in &results {
      assert_eq!(*thread, origin, "delivery must happen on the originating thread");
      let binding = format!("LDAP://server/CN=obj{},DC=y", i);
      match result {
        Ok(wrapper) => {
          assert!(i % 2 == 1, "bind {} should have failed", i);
          let raw = wrapper.object().raw().unwrap();
          assert_eq!(provider.binding_of(raw).as_deref(), Some(binding.as_str()));
          assert!(ok_ids.insert(wrapper.object().id().to_string()));
        }
        Err(err) => {
          assert!(i % 2 == 0, "bind {} should have succeeded: {}", i, err);
          assert_eq!(err.native_code(), Some(E_ADS_BAD_PATHNAME));
        }
      }
    }
    assert_eq!(provider.calls(), 8);
    assert_eq!(ok_ids.len(), 4);
    assert_eq!(provider.live_objects(), 4);

    drop(results);
    assert_eq!(provider.live_objects(), 0);
    assert_eq!(provider.invalid_releases(), 0);
  }

  #[test]
  #[traced_test]
  fn password_is_never_logged() {
    let (_provider, bridge) = bridge(MemoryProvider::open_directory());
    let request = BindingRequest::new(TARGET)
      .unwrap()
      .with_user("alice")
      .with_password("correct-horse");
    let _wrapper = bridge.open_blocking(Operation::OpenObject, request).unwrap();
    assert!(logs_contain("bind succeeded"));
    assert!(!logs_contain("correct-horse"));
  }
}
