//! Caller-visible errors and native status translation.

use std::fmt;

use thiserror::Error;

use crate::provider::DirectoryProvider;
use crate::status::NativeStatus;

/// The foreign operation a bind was performed with.
///
/// Its name prefixes every translated native failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  OpenObject,
  GetObject,
}

impl Operation {
  pub fn as_str(self) -> &'static str {
    match self {
      Operation::OpenObject => "ADsOpenObject",
      Operation::GetObject => "ADsGetObject",
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors surfaced by the binding bridge.
#[derive(Debug, Clone, Error)]
pub enum BindError {
  /// The request was malformed. Raised before any foreign call.
  #[error("{message}\nusage: {usage}")]
  InvalidArgument { usage: &'static str, message: String },

  /// The foreign call returned a failure status.
  #[error("error in {operation}: {message}")]
  NativeFailure {
    operation: Operation,
    message: String,
    code: u32,
  },

  /// The process-wide directory runtime is missing or unusable.
  #[error("directory runtime unavailable: {0}")]
  ProcessState(String),
}

impl BindError {
  pub fn invalid_argument(usage: &'static str, message: impl Into<String>) -> Self {
    BindError::InvalidArgument {
      usage,
      message: message.into(),
    }
  }

  /// The native code, when the error came from a foreign call.
  pub fn native_code(&self) -> Option<u32> {
    match self {
      BindError::NativeFailure { code, .. } => Some(*code),
      _ => None,
    }
  }
}

/// Translate a native status into the error surfaced to the caller.
///
/// The message comes from the provider's status-message facility so that
/// platform-specific text is preferred over the built-in table.
pub fn translate(operation: Operation, status: &NativeStatus, provider: &dyn DirectoryProvider) -> BindError {
  BindError::NativeFailure {
    operation,
    message: provider.status_message(status),
    code: status.code,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::provider::memory::MemoryProvider;
  use crate::status::E_ADS_BAD_PATHNAME;

  #[test]
  fn translated_message_names_operation() {
    let provider = MemoryProvider::open_directory();
    let err = translate(Operation::OpenObject, &NativeStatus::new(E_ADS_BAD_PATHNAME), &provider);
    let text = err.to_string();
    assert!(text.starts_with("error in ADsOpenObject: "), "{}", text);
    assert!(text.contains("An invalid directory pathname was passed"), "{}", text);
    assert!(text.contains("0x80005000"), "{}", text);
    assert_eq!(err.native_code(), Some(E_ADS_BAD_PATHNAME));
  }

  #[test]
  fn invalid_argument_includes_usage() {
    let err = BindError::invalid_argument("f(x: string)", "need x");
    assert_eq!(err.to_string(), "need x\nusage: f(x: string)");
    assert_eq!(err.native_code(), None);
  }
}
