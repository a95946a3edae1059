//! ADSI provider over COM.
//!
//! Every thread that opens or releases objects joins the multithreaded
//! apartment. The process-level `initialize` joins it on the originating
//! thread; blocking-pool threads join lazily through a thread-local guard that
//! leaves the apartment when the thread exits.

use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;

use tracing::debug;
use windows_sys::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows_sys::Win32::Networking::ActiveDirectory::{ADsGetLastError, ADsOpenObject};
use windows_sys::Win32::System::Com::{COINIT_MULTITHREADED, CoInitializeEx, CoUninitialize};
use windows_sys::Win32::System::Diagnostics::Debug::{
  FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS, FormatMessageW,
};
use windows_sys::core::{GUID, HRESULT};

use super::{DirectoryProvider, OpenParams};
use crate::handle::RawObject;
use crate::status::{self, E_FAIL, NativeStatus};

#[repr(C)]
struct IUnknownVtbl {
  query_interface: unsafe extern "system" fn(*mut c_void, *const GUID, *mut *mut c_void) -> HRESULT,
  add_ref: unsafe extern "system" fn(*mut c_void) -> u32,
  release: unsafe extern "system" fn(*mut c_void) -> u32,
}

/// # Safety
///
/// `raw` must point to a live COM object.
unsafe fn vtable<'a>(raw: RawObject) -> &'a IUnknownVtbl {
  // SAFETY: the first word of every COM object is its vtable pointer.
  unsafe { &**(raw.as_ptr() as *const *const IUnknownVtbl) }
}

fn failed(hr: HRESULT) -> bool {
  hr < 0
}

fn to_wide(value: &str) -> Vec<u16> {
  value.encode_utf16().chain(std::iter::once(0)).collect()
}

fn from_wide(buffer: &[u16]) -> String {
  let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
  String::from_utf16_lossy(&buffer[..len]).trim_end().trim_end_matches('.').to_string()
}

/// Membership of the calling thread in the multithreaded apartment.
struct Apartment {
  joined: bool,
}

impl Apartment {
  fn enter() -> Result<Self, NativeStatus> {
    // SAFETY: reserved pointer must be null.
    let hr = unsafe { CoInitializeEx(ptr::null(), COINIT_MULTITHREADED as _) };
    if hr == RPC_E_CHANGED_MODE {
      // The thread already joined a single-threaded apartment; leave it be.
      return Ok(Self { joined: false });
    }
    if failed(hr) {
      return Err(NativeStatus::new(hr as u32));
    }
    Ok(Self { joined: true })
  }
}

impl Drop for Apartment {
  fn drop(&mut self) {
    if self.joined {
      // SAFETY: paired with the successful CoInitializeEx in `enter`.
      unsafe { CoUninitialize() };
    }
  }
}

thread_local! {
  static THREAD_APARTMENT: RefCell<Option<Apartment>> = const { RefCell::new(None) };
  static PROCESS_APARTMENT: RefCell<Option<Apartment>> = const { RefCell::new(None) };
}

fn ensure_thread_apartment() -> Result<(), NativeStatus> {
  let joined_by_process = PROCESS_APARTMENT.with(|a| a.borrow().is_some());
  if joined_by_process {
    return Ok(());
  }
  THREAD_APARTMENT.with(|slot| {
    let mut slot = slot.borrow_mut();
    if slot.is_none() {
      *slot = Some(Apartment::enter()?);
    }
    Ok(())
  })
}

/// Text from ADsGetLastError for the calling thread, if the provider set any.
fn last_adsi_error() -> Option<String> {
  let mut code: u32 = 0;
  let mut message = [0u16; 512];
  let mut provider = [0u16; 128];
  // SAFETY: buffers are valid for the lengths passed.
  let hr = unsafe {
    ADsGetLastError(
      &mut code,
      message.as_mut_ptr(),
      message.len() as u32,
      provider.as_mut_ptr(),
      provider.len() as u32,
    )
  };
  if failed(hr) || code == 0 {
    return None;
  }
  let text = from_wide(&message);
  let provider = from_wide(&provider);
  match (text.is_empty(), provider.is_empty()) {
    (true, _) => None,
    (false, true) => Some(text),
    (false, false) => Some(format!("{}: {}", provider, text)),
  }
}

fn system_message(code: u32) -> Option<String> {
  let mut buffer = [0u16; 512];
  // SAFETY: FORMAT_MESSAGE_FROM_SYSTEM without ALLOCATE_BUFFER writes at most
  // `nsize` characters into the provided buffer.
  let len = unsafe {
    FormatMessageW(
      FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
      ptr::null(),
      code,
      0,
      buffer.as_mut_ptr(),
      buffer.len() as u32,
      ptr::null(),
    )
  };
  if len == 0 {
    return None;
  }
  let text = from_wide(&buffer[..len as usize]);
  (!text.is_empty()).then_some(text)
}

#[derive(Debug, Default)]
pub struct AdsiProvider;

impl AdsiProvider {
  pub fn new() -> Self {
    Self
  }
}

impl DirectoryProvider for AdsiProvider {
  fn name(&self) -> &'static str {
    "adsi"
  }

  /// Joins the multithreaded apartment on the calling thread.
  fn initialize(&self) -> Result<(), NativeStatus> {
    let apartment = Apartment::enter()?;
    PROCESS_APARTMENT.with(|slot| *slot.borrow_mut() = Some(apartment));
    debug!("joined multithreaded apartment");
    Ok(())
  }

  /// Leaves the apartment joined by `initialize` on this thread. The last lease
  /// can drop on a blocking-pool thread, where this is a no-op; the owner's
  /// apartment is then replaced by its next `initialize`.
  fn uninitialize(&self) {
    PROCESS_APARTMENT.with(|slot| slot.borrow_mut().take());
  }

  fn open_object(&self, params: &OpenParams<'_>) -> Result<RawObject, NativeStatus> {
    ensure_thread_apartment()?;

    let binding = to_wide(params.binding);
    let user = params.user.map(to_wide);
    let password = params.password.map(to_wide);
    let iid = GUID::from_u128(params.interface.0);
    let mut object: *mut c_void = ptr::null_mut();

    // SAFETY: strings are NUL-terminated and outlive the call; absent
    // credentials are passed as null as the API requires.
    let hr = unsafe {
      ADsOpenObject(
        binding.as_ptr(),
        user.as_ref().map_or(ptr::null(), |u| u.as_ptr()),
        password.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
        params.auth_flags as _,
        &iid,
        &mut object,
      )
    };

    if failed(hr) {
      let code = hr as u32;
      // Extended errors are per thread, so they are captured here.
      return Err(match last_adsi_error() {
        Some(detail) => NativeStatus::with_detail(code, detail),
        None => NativeStatus::new(code),
      });
    }
    RawObject::new(object).ok_or_else(|| NativeStatus::new(E_FAIL))
  }

  unsafe fn add_ref(&self, raw: RawObject) -> Result<(), NativeStatus> {
    ensure_thread_apartment()?;
    // SAFETY: the caller guarantees raw is a live object from open_object.
    unsafe { (vtable(raw).add_ref)(raw.as_ptr()) };
    Ok(())
  }

  unsafe fn release(&self, raw: RawObject) {
    // SAFETY: the caller gives up one owned reference on a live object.
    unsafe { (vtable(raw).release)(raw.as_ptr()) };
  }

  fn status_message(&self, status: &NativeStatus) -> String {
    if status::known_message(status.code).is_some() {
      return status::describe(status);
    }
    match system_message(status.code) {
      Some(message) => {
        let base = format!("{} ({})", message, status);
        match &status.detail {
          Some(detail) => format!("{}: {}", base, detail),
          None => base,
        }
      }
      None => status::describe(status),
    }
  }
}
