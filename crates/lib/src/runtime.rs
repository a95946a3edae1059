//! Process-wide lifecycle of the directory runtime.
//!
//! The runtime is initialized when the first [`RuntimeLease`] is taken and torn
//! down when the last one is dropped. A long-lived session lease (held by the
//! Lua runtime or the CLI) keeps individual calls, including failed ones, from
//! ever tearing the runtime down underneath later calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::BindError;
use crate::provider::DirectoryProvider;

pub struct ProcessRuntime {
  provider: Arc<dyn DirectoryProvider>,
  leases: Mutex<usize>,
}

impl ProcessRuntime {
  pub fn new(provider: Arc<dyn DirectoryProvider>) -> Arc<Self> {
    Arc::new(Self {
      provider,
      leases: Mutex::new(0),
    })
  }

  fn leases(&self) -> MutexGuard<'_, usize> {
    self.leases.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Take a lease, initializing the runtime if nobody holds one.
  pub fn acquire(self: &Arc<Self>) -> Result<RuntimeLease, BindError> {
    let mut leases = self.leases();
    if *leases == 0 {
      self.provider.initialize().map_err(|status| {
        BindError::ProcessState(format!(
          "failed to initialize the {} runtime: {}",
          self.provider.name(),
          self.provider.status_message(&status)
        ))
      })?;
      info!(provider = self.provider.name(), "directory runtime initialized");
    }
    *leases += 1;
    Ok(RuntimeLease { runtime: self.clone() })
  }

  pub fn lease_count(&self) -> usize {
    *self.leases()
  }

  fn release(&self) {
    let mut leases = self.leases();
    *leases = leases.saturating_sub(1);
    if *leases == 0 {
      self.provider.uninitialize();
      info!(provider = self.provider.name(), "directory runtime torn down");
    } else {
      debug!(leases = *leases, "runtime lease released");
    }
  }
}

/// Keeps the directory runtime initialized while alive. Released exactly once,
/// on drop.
#[must_use = "the runtime is torn down as soon as the lease is dropped"]
pub struct RuntimeLease {
  runtime: Arc<ProcessRuntime>,
}

impl RuntimeLease {
  /// Another lease on the same runtime. The runtime is already up while this
  /// lease exists, so sharing never initializes.
  pub fn share(&self) -> RuntimeLease {
    *self.runtime.leases() += 1;
    RuntimeLease {
      runtime: self.runtime.clone(),
    }
  }
}

impl Drop for RuntimeLease {
  fn drop(&mut self) {
    self.runtime.release();
  }
}
