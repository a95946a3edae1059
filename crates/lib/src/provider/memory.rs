//! In-process directory provider.
//!
//! Serves a fixed set of objects described in code or in a JSON file:
//!
//! ```json
//! { "objects": [ { "binding": "LDAP://dc1/CN=Users,DC=corp", "user": "corp\\svc", "password": "..." } ] }
//! ```
//!
//! Objects without a `user` accept the caller's current credentials. The
//! provider keeps counters of every call it sees so tests can assert on how
//! the bridge drove it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{DirectoryProvider, OpenParams};
use crate::config::ConfigError;
use crate::handle::RawObject;
use crate::request::{ADS_NO_AUTHENTICATION, InterfaceId};
use crate::status::{
  CO_E_NOTINITIALIZED, E_ADS_BAD_PATHNAME, ERROR_DS_NO_SUCH_OBJECT, ERROR_LOGON_FAILURE, NativeStatus,
};

const PROVIDER_PREFIXES: &[&str] = &["LDAP://", "GC://", "WinNT://", "NDS://"];
const FIRST_ADDR: usize = 0x1000;
const ADDR_STEP: usize = 0x10;

/// One object served by the memory provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
  pub binding: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
}

impl DirectoryEntry {
  pub fn new(binding: impl Into<String>) -> Self {
    Self {
      binding: binding.into(),
      user: None,
      password: None,
    }
  }

  pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
    self.user = Some(user.into());
    self.password = Some(password.into());
    self
  }
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
  objects: Vec<DirectoryEntry>,
}

/// Arguments of an open call as seen by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenCall {
  pub binding: String,
  pub user: Option<String>,
  pub password: Option<String>,
  pub auth_flags: u32,
  pub interface: InterfaceId,
}

type FailurePlan = Box<dyn Fn(usize) -> Option<u32> + Send + Sync>;
type BindingFailurePlan = Box<dyn Fn(&str) -> Option<u32> + Send + Sync>;

#[derive(Default)]
struct MemoryState {
  initialized: bool,
  initializations: usize,
  next_addr: usize,
  live: HashMap<usize, u32>,
  opened_for: HashMap<usize, String>,
  seen: Vec<SeenCall>,
  releases: usize,
  invalid_releases: usize,
  releases_after_teardown: usize,
}

pub struct MemoryProvider {
  /// `None` serves any well-formed binding.
  entries: Option<Vec<DirectoryEntry>>,
  failures: Option<FailurePlan>,
  binding_failures: Option<BindingFailurePlan>,
  latency: Option<Duration>,
  state: Mutex<MemoryState>,
}

impl MemoryProvider {
  /// A directory that contains exactly `entries`.
  pub fn new(entries: Vec<DirectoryEntry>) -> Self {
    Self::with_entries(Some(entries))
  }

  /// A directory that answers every well-formed binding.
  pub fn open_directory() -> Self {
    Self::with_entries(None)
  }

  fn with_entries(entries: Option<Vec<DirectoryEntry>>) -> Self {
    Self {
      entries,
      failures: None,
      binding_failures: None,
      latency: None,
      state: Mutex::new(MemoryState {
        next_addr: FIRST_ADDR,
        ..Default::default()
      }),
    }
  }

  pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
    let file: DirectoryFile = serde_json::from_str(content)?;
    Ok(Self::new(file.objects))
  }

  pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadDirectory {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&content).map_err(|source| ConfigError::ParseDirectory {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Fail open calls chosen by `plan`, which receives the zero-based call
  /// index and returns the status code to fail with.
  pub fn with_failures(mut self, plan: impl Fn(usize) -> Option<u32> + Send + Sync + 'static) -> Self {
    self.failures = Some(Box::new(plan));
    self
  }

  /// Fail open calls whose binding `plan` maps to a status code.
  pub fn with_failing_bindings(mut self, plan: impl Fn(&str) -> Option<u32> + Send + Sync + 'static) -> Self {
    self.binding_failures = Some(Box::new(plan));
    self
  }

  /// Block every open call for `latency` before answering.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  fn state(&self) -> MutexGuard<'_, MemoryState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn is_initialized(&self) -> bool {
    self.state().initialized
  }

  /// Number of times the runtime was initialized.
  pub fn initializations(&self) -> usize {
    self.state().initializations
  }

  /// Number of open calls received.
  pub fn calls(&self) -> usize {
    self.state().seen.len()
  }

  pub fn seen_calls(&self) -> Vec<SeenCall> {
    self.state().seen.clone()
  }

  /// Number of objects that are still referenced.
  pub fn live_objects(&self) -> usize {
    self.state().live.len()
  }

  /// Number of objects whose last reference was released.
  pub fn releases(&self) -> usize {
    self.state().releases
  }

  /// Number of release calls on objects that were not live.
  pub fn invalid_releases(&self) -> usize {
    self.state().invalid_releases
  }

  /// Number of release calls made while the runtime was not initialized.
  pub fn releases_after_teardown(&self) -> usize {
    self.state().releases_after_teardown
  }

  pub fn ref_count(&self, raw: RawObject) -> Option<u32> {
    self.state().live.get(&raw.addr()).copied()
  }

  /// Binding a live object was opened for.
  pub fn binding_of(&self, raw: RawObject) -> Option<String> {
    self.state().opened_for.get(&raw.addr()).cloned()
  }

  fn check_credentials(entry: &DirectoryEntry, params: &OpenParams<'_>) -> Result<(), NativeStatus> {
    let Some(expected_user) = entry.user.as_deref() else {
      return Ok(());
    };
    if params.auth_flags & ADS_NO_AUTHENTICATION != 0 {
      return Err(NativeStatus::with_detail(ERROR_LOGON_FAILURE, "anonymous bind refused"));
    }
    let user_ok = params.user.is_some_and(|u| u.eq_ignore_ascii_case(expected_user));
    let password_ok = params.password == entry.password.as_deref();
    if user_ok && password_ok {
      Ok(())
    } else {
      Err(NativeStatus::new(ERROR_LOGON_FAILURE))
    }
  }

  fn lookup(&self, params: &OpenParams<'_>) -> Result<(), NativeStatus> {
    if !PROVIDER_PREFIXES.iter().any(|p| params.binding.starts_with(p)) || !params.binding.contains("//") {
      return Err(NativeStatus::new(E_ADS_BAD_PATHNAME));
    }
    let Some(entries) = &self.entries else {
      return Ok(());
    };
    let entry = entries
      .iter()
      .find(|e| e.binding.eq_ignore_ascii_case(params.binding))
      .ok_or_else(|| NativeStatus::new(ERROR_DS_NO_SUCH_OBJECT))?;
    Self::check_credentials(entry, params)
  }
}

impl Default for MemoryProvider {
  fn default() -> Self {
    Self::open_directory()
  }
}

impl DirectoryProvider for MemoryProvider {
  fn name(&self) -> &'static str {
    "memory"
  }

  fn initialize(&self) -> Result<(), NativeStatus> {
    let mut state = self.state();
    state.initialized = true;
    state.initializations += 1;
    Ok(())
  }

  fn uninitialize(&self) {
    self.state().initialized = false;
  }

  fn open_object(&self, params: &OpenParams<'_>) -> Result<RawObject, NativeStatus> {
    let index = {
      let mut state = self.state();
      state.seen.push(SeenCall {
        binding: params.binding.to_string(),
        user: params.user.map(str::to_string),
        password: params.password.map(str::to_string),
        auth_flags: params.auth_flags,
        interface: params.interface,
      });
      if !state.initialized {
        return Err(NativeStatus::new(CO_E_NOTINITIALIZED));
      }
      state.seen.len() - 1
    };

    if let Some(latency) = self.latency {
      std::thread::sleep(latency);
    }

    if let Some(code) = self.failures.as_ref().and_then(|plan| plan(index)) {
      return Err(NativeStatus::new(code));
    }
    if let Some(code) = self.binding_failures.as_ref().and_then(|plan| plan(params.binding)) {
      return Err(NativeStatus::new(code));
    }
    self.lookup(params)?;

    let mut state = self.state();
    let addr = state.next_addr;
    state.next_addr += ADDR_STEP;
    state.live.insert(addr, 1);
    state.opened_for.insert(addr, params.binding.to_string());
    RawObject::from_addr(addr).ok_or_else(|| NativeStatus::new(crate::status::E_FAIL))
  }

  unsafe fn add_ref(&self, raw: RawObject) -> Result<(), NativeStatus> {
    let mut state = self.state();
    match state.live.get_mut(&raw.addr()) {
      Some(refs) => {
        *refs += 1;
        Ok(())
      }
      None => Err(NativeStatus::new(crate::status::E_ADS_UNKNOWN_OBJECT)),
    }
  }

  unsafe fn release(&self, raw: RawObject) {
    let mut state = self.state();
    let addr = raw.addr();
    if !state.initialized {
      state.releases_after_teardown += 1;
      warn!(addr = addr, "release after the runtime was torn down");
    }
    match state.live.get_mut(&addr) {
      Some(refs) if *refs > 1 => *refs -= 1,
      Some(_) => {
        state.live.remove(&addr);
        state.opened_for.remove(&addr);
        state.releases += 1;
      }
      None => {
        state.invalid_releases += 1;
        warn!(addr = addr, "release of an object that is not live");
      }
    }
  }
}
