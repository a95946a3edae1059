//! Native status codes returned by the directory runtime.
//!
//! Codes are kept as the raw 32-bit HRESULT bit pattern so they print the way
//! Windows tooling prints them (`0x80005000`).

use std::fmt;

pub const E_FAIL: u32 = 0x8000_4005;
pub const E_ACCESSDENIED: u32 = 0x8007_0005;
pub const E_OUTOFMEMORY: u32 = 0x8007_000E;
pub const CO_E_NOTINITIALIZED: u32 = 0x8004_01F0;
pub const E_ADS_BAD_PATHNAME: u32 = 0x8000_5000;
pub const E_ADS_UNKNOWN_OBJECT: u32 = 0x8000_5004;
pub const E_ADS_BAD_PARAMETER: u32 = 0x8000_5008;
pub const ERROR_LOGON_FAILURE: u32 = 0x8007_052E;
pub const ERROR_DS_NO_SUCH_OBJECT: u32 = 0x8007_2030;
pub const ERROR_DS_SERVER_DOWN: u32 = 0x8007_203A;

const MESSAGES: &[(u32, &str)] = &[
  (E_FAIL, "Unspecified error"),
  (E_ACCESSDENIED, "Access is denied"),
  (E_OUTOFMEMORY, "Not enough memory resources are available to complete this operation"),
  (CO_E_NOTINITIALIZED, "CoInitialize has not been called"),
  (E_ADS_BAD_PATHNAME, "An invalid directory pathname was passed"),
  (0x8000_5001, "An unknown directory domain object was requested"),
  (0x8000_5002, "An unknown directory user object was requested"),
  (0x8000_5003, "An unknown directory computer object was requested"),
  (E_ADS_UNKNOWN_OBJECT, "An unknown directory object was requested"),
  (0x8000_5005, "The specified directory property was not set"),
  (0x8000_5006, "The specified directory property is not supported"),
  (0x8000_5007, "The specified directory property is invalid"),
  (E_ADS_BAD_PARAMETER, "One or more input parameters are invalid"),
  (0x8000_5009, "The specified directory object is not bound to a remote resource"),
  (0x8000_500A, "The specified directory object has not been modified"),
  (0x8000_500B, "The specified directory object has been modified"),
  (0x8000_500C, "The directory datatype cannot be converted to/from a native DS datatype"),
  (0x8000_500D, "The directory property cannot be found in the cache"),
  (0x8000_500E, "The directory object exists"),
  (0x8000_500F, "The attempted action violates the directory service schema rules"),
  (0x8000_5010, "The specified column in the directory was not set"),
  (0x8000_5014, "The specified search filter is invalid"),
  (ERROR_LOGON_FAILURE, "The user name or password is incorrect"),
  (ERROR_DS_NO_SUCH_OBJECT, "There is no such object on the server"),
  (ERROR_DS_SERVER_DOWN, "The server is not operational"),
];

/// A failure status reported by the directory runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatus {
  pub code: u32,
  /// Extended diagnostic text captured on the thread that made the failing call.
  pub detail: Option<String>,
}

impl NativeStatus {
  pub fn new(code: u32) -> Self {
    Self { code, detail: None }
  }

  pub fn with_detail(code: u32, detail: impl Into<String>) -> Self {
    Self {
      code,
      detail: Some(detail.into()),
    }
  }
}

impl fmt::Display for NativeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x{:08X}", self.code)
  }
}

/// Look up the built-in message for a known ADSI or Win32 code.
pub fn known_message(code: u32) -> Option<&'static str> {
  MESSAGES.iter().find(|(c, _)| *c == code).map(|(_, m)| *m)
}

/// Render a status using the built-in table.
///
/// The result always ends with the hex code so callers can search for it.
pub fn describe(status: &NativeStatus) -> String {
  let base = match known_message(status.code) {
    Some(message) => format!("{} ({})", message, status),
    None => format!("unknown status {}", status),
  };
  match &status.detail {
    Some(detail) if !detail.is_empty() => format!("{}: {}", base, detail),
    _ => base,
  }
}
