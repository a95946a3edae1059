//! The single blocking call that turns a request into a live object.

use std::sync::Arc;

use tracing::debug;

use crate::handle::{ForeignObjectHandle, HandleCodec};
use crate::provider::{DirectoryProvider, OpenParams};
use crate::request::BindingRequest;
use crate::runtime::RuntimeLease;
use crate::status::NativeStatus;

/// Result of one bind attempt. Produced once and consumed once.
pub type BindOutcome = Result<ForeignObjectHandle, NativeStatus>;

#[derive(Clone)]
pub struct ObjectBinder {
  provider: Arc<dyn DirectoryProvider>,
}

impl ObjectBinder {
  pub fn new(provider: Arc<dyn DirectoryProvider>) -> Self {
    Self { provider }
  }

  pub fn provider(&self) -> &Arc<dyn DirectoryProvider> {
    &self.provider
  }

  /// Open the requested object. Blocks the calling thread.
  ///
  /// Empty user names and passwords are passed to the provider as absent.
  /// Nothing else is done with the object: it is returned untouched with its
  /// single reference and a share of `lease`.
  pub fn bind(&self, request: &BindingRequest, lease: &RuntimeLease) -> BindOutcome {
    let params = OpenParams {
      binding: request.target_uri(),
      user: non_empty(request.user()),
      password: non_empty(request.password()),
      auth_flags: request.auth_flags(),
      interface: request.capability().interface_id(),
    };

    debug!(
      binding = %params.binding,
      capability = %request.capability(),
      interface = %params.interface,
      auth_flags = params.auth_flags,
      explicit_credentials = params.user.is_some(),
      "opening directory object"
    );

    let raw = self.provider.open_object(&params).inspect_err(|status| {
      debug!(binding = %params.binding, status = %status, "open failed");
    })?;

    debug!(binding = %params.binding, handle = %HandleCodec::encode(raw), "open succeeded");
    Ok(ForeignObjectHandle::new(
      raw,
      request.capability(),
      self.provider.clone(),
      lease.share(),
    ))
  }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::provider::memory::MemoryProvider;
  use crate::request::{Capability, InterfaceId};
  use crate::runtime::ProcessRuntime;
  use crate::status::E_ADS_BAD_PATHNAME;
  use tracing_test::traced_test;

  fn binder() -> (Arc<MemoryProvider>, ObjectBinder, RuntimeLease) {
    let provider = Arc::new(MemoryProvider::open_directory());
    let lease = ProcessRuntime::new(provider.clone()).acquire().unwrap();
    (provider.clone(), ObjectBinder::new(provider), lease)
  }

  #[test]
  fn empty_credentials_reach_provider_as_absent() {
    let (provider, binder, lease) = binder();
    let request = BindingRequest::new("LDAP://server/CN=x,DC=y")
      .unwrap()
      .with_user("")
      .with_password("");
    let _handle = binder.bind(&request, &lease).unwrap();

    let seen = provider.seen_calls();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].user, None);
    assert_eq!(seen[0].password, None);
  }

  #[test]
  fn credentials_and_interface_are_passed_through() {
    let (provider, binder, lease) = binder();
    let request = BindingRequest::new("LDAP://server/CN=x,DC=y")
      .unwrap()
      .with_user("CORP\\alice")
      .with_password("s3cret")
      .with_auth_flags(0x201)
      .with_capability(Capability::DirectorySearch);
    let handle = binder.bind(&request, &lease).unwrap();
    assert_eq!(handle.capability(), Capability::DirectorySearch);

    let seen = &provider.seen_calls()[0];
    assert_eq!(seen.user.as_deref(), Some("CORP\\alice"));
    assert_eq!(seen.password.as_deref(), Some("s3cret"));
    assert_eq!(seen.auth_flags, 0x201);
    assert_eq!(seen.interface, InterfaceId::IDIRECTORY_SEARCH);
  }

  #[test]
  fn bind_makes_exactly_one_provider_call_and_keeps_the_object() {
    let (provider, binder, lease) = binder();
    let handle = binder.bind(&BindingRequest::new("LDAP://server").unwrap(), &lease).unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.ref_count(handle.raw()), Some(1));
    assert_eq!(provider.releases(), 0);
  }

  #[test]
  fn failure_carries_native_status() {
    let (provider, binder, lease) = binder();
    let status = binder.bind(&BindingRequest::new("bogus").unwrap(), &lease).unwrap_err();
    assert_eq!(status.code, E_ADS_BAD_PATHNAME);
    assert_eq!(provider.live_objects(), 0);
  }

  #[test]
  fn bound_object_holds_the_runtime() {
    let (provider, binder, lease) = binder();
    let handle = binder.bind(&BindingRequest::new("LDAP://server").unwrap(), &lease).unwrap();
    drop(lease);
    assert!(provider.is_initialized());
    drop(handle);
    assert!(!provider.is_initialized());
    assert_eq!(provider.releases_after_teardown(), 0);
  }

  #[test]
  fn failed_bind_takes_no_share() {
    let (provider, binder, lease) = binder();
    let _status = binder.bind(&BindingRequest::new("bogus").unwrap(), &lease).unwrap_err();
    drop(lease);
    assert!(!provider.is_initialized());
  }

  #[test]
  #[traced_test]
  fn bind_logs_the_requested_interface() {
    let (_provider, binder, lease) = binder();
    let request = BindingRequest::new("LDAP://server").unwrap().with_capability(Capability::Container);
    let _handle = binder.bind(&request, &lease).unwrap();
    assert!(logs_contain("{001677D0-FD16-11CE-ABC4-02608C9E7553}"));
  }
}
