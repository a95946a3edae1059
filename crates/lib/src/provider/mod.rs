//! Directory providers: the only code that talks to the foreign runtime.
//!
//! # Submodules
//!
//! - [`adsi`] - ADSI over COM (Windows only)
//! - [`memory`] - In-process directory used off Windows and as a test double

#[cfg(windows)]
pub mod adsi;
pub mod memory;

use crate::handle::RawObject;
use crate::request::InterfaceId;
use crate::status::{self, NativeStatus};

/// Arguments of one open call, already normalized by the binder.
#[derive(Debug, Clone, Copy)]
pub struct OpenParams<'a> {
  pub binding: &'a str,
  /// `None` means "use the caller's current credentials".
  pub user: Option<&'a str>,
  pub password: Option<&'a str>,
  pub auth_flags: u32,
  pub interface: InterfaceId,
}

/// A foreign directory runtime.
///
/// `initialize` and `uninitialize` are driven by
/// [`ProcessRuntime`](crate::runtime::ProcessRuntime), which calls them at
/// most once per lease cycle.
pub trait DirectoryProvider: Send + Sync {
  fn name(&self) -> &'static str;

  fn initialize(&self) -> Result<(), NativeStatus>;

  fn uninitialize(&self);

  /// Open the object named by `params.binding` and return it with exactly one
  /// outstanding reference. May block for as long as the directory takes.
  fn open_object(&self, params: &OpenParams<'_>) -> Result<RawObject, NativeStatus>;

  /// Add a reference to `raw`.
  ///
  /// # Safety
  ///
  /// `raw` must have been returned by this provider's `open_object` and must
  /// still hold at least one outstanding reference.
  unsafe fn add_ref(&self, raw: RawObject) -> Result<(), NativeStatus>;

  /// Drop one reference on `raw`.
  ///
  /// # Safety
  ///
  /// Same as [`add_ref`](Self::add_ref). The caller gives up the reference it
  /// owned and must not use `raw` through it again.
  unsafe fn release(&self, raw: RawObject);

  /// Human-readable text for a failure status.
  fn status_message(&self, status: &NativeStatus) -> String {
    status::describe(status)
  }
}
