//! Owned foreign object handles and their text encoding.
//!
//! A [`ForeignObjectHandle`] owns exactly one reference on a live foreign
//! object and releases it when dropped. It also holds a lease on the runtime
//! the object was bound under, so the release always happens before that
//! runtime can be torn down. [`HandleCodec`] turns the object's
//! address into the identifier string carried by the Lua wrappers.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::provider::DirectoryProvider;
use crate::request::Capability;
use crate::runtime::RuntimeLease;
use crate::status::NativeStatus;

/// Address of a live foreign object.
///
/// The value is never dereferenced outside a provider.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawObject(NonNull<c_void>);

// SAFETY: a RawObject is an address that is only dereferenced by the provider
// that produced it. Providers used with the bridge are free-threaded (ADSI
// objects live in the multithreaded apartment), so the address may move to
// the thread that consumes the bind result.
unsafe impl Send for RawObject {}

impl RawObject {
  pub fn new(ptr: *mut c_void) -> Option<Self> {
    NonNull::new(ptr).map(RawObject)
  }

  pub fn from_addr(addr: usize) -> Option<Self> {
    Self::new(addr as *mut c_void)
  }

  pub fn as_ptr(self) -> *mut c_void {
    self.0.as_ptr()
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }
}

impl fmt::Debug for RawObject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "RawObject({})", HandleCodec::encode(*self))
  }
}

/// An owned reference on a foreign object, tagged with the capability it was
/// bound under.
pub struct ForeignObjectHandle {
  raw: RawObject,
  capability: Capability,
  provider: Arc<dyn DirectoryProvider>,
  // Dropped after `Drop::drop` has released the object.
  _lease: RuntimeLease,
}

impl ForeignObjectHandle {
  /// Take ownership of one outstanding reference on `raw`.
  pub(crate) fn new(
    raw: RawObject,
    capability: Capability,
    provider: Arc<dyn DirectoryProvider>,
    lease: RuntimeLease,
  ) -> Self {
    Self {
      raw,
      capability,
      provider,
      _lease: lease,
    }
  }

  pub fn raw(&self) -> RawObject {
    self.raw
  }

  pub fn capability(&self) -> Capability {
    self.capability
  }

  /// Produce a second owned handle by adding a reference.
  pub fn try_clone(&self) -> Result<Self, NativeStatus> {
    // SAFETY: self owns a live reference on raw, obtained from this provider.
    unsafe { self.provider.add_ref(self.raw)? };
    Ok(Self {
      raw: self.raw,
      capability: self.capability,
      provider: self.provider.clone(),
      _lease: self._lease.share(),
    })
  }
}

impl Drop for ForeignObjectHandle {
  fn drop(&mut self) {
    debug!(handle = %HandleCodec::encode(self.raw), provider = self.provider.name(), "releasing foreign object");
    // SAFETY: the handle owns exactly one reference, and drop runs once.
    unsafe { self.provider.release(self.raw) };
  }
}

impl fmt::Debug for ForeignObjectHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ForeignObjectHandle")
      .field("raw", &self.raw)
      .field("capability", &self.capability)
      .field("provider", &self.provider.name())
      .finish()
  }
}

/// An owned handle together with its encoded identifier.
#[derive(Debug)]
pub struct EncodedObject {
  pub id: String,
  pub handle: ForeignObjectHandle,
}

impl EncodedObject {
  pub fn capability(&self) -> Capability {
    self.handle.capability()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
  #[error("malformed handle identifier '{0}'")]
  Malformed(String),

  #[error("handle identifier '{0}' is null")]
  Null(String),

  #[error("handle identifier '{0}' does not fit in a pointer")]
  OutOfRange(String),
}

/// Encodes object addresses as `0x` followed by 16 hex digits.
pub struct HandleCodec;

impl HandleCodec {
  pub fn encode(raw: RawObject) -> String {
    format!("0x{}", hex::encode((raw.addr() as u64).to_be_bytes()))
  }

  pub fn encode_handle(handle: ForeignObjectHandle) -> EncodedObject {
    EncodedObject {
      id: Self::encode(handle.raw()),
      handle,
    }
  }

  pub fn decode(id: &str) -> Result<RawObject, CodecError> {
    let digits = id
      .strip_prefix("0x")
      .or_else(|| id.strip_prefix("0X"))
      .ok_or_else(|| CodecError::Malformed(id.to_string()))?;

    let bytes = hex::decode(digits).map_err(|_| CodecError::Malformed(id.to_string()))?;
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| CodecError::Malformed(id.to_string()))?;
    let addr = usize::try_from(u64::from_be_bytes(bytes)).map_err(|_| CodecError::OutOfRange(id.to_string()))?;

    RawObject::from_addr(addr).ok_or_else(|| CodecError::Null(id.to_string()))
  }
}
