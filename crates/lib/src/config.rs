//! Bridge configuration from the environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::consts::{DIRECTORY_ENV, PROVIDER_ENV};
use crate::provider::DirectoryProvider;
use crate::provider::memory::MemoryProvider;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unknown provider '{0}' (expected 'adsi' or 'memory')")]
  UnknownProvider(String),

  #[error("the {0} provider is not available on this platform")]
  Unsupported(ProviderKind),

  #[error("cannot read directory file '{}': {source}", path.display())]
  ReadDirectory {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot parse directory file '{}': {source}", path.display())]
  ParseDirectory {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
  Adsi,
  Memory,
}

impl ProviderKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ProviderKind::Adsi => "adsi",
      ProviderKind::Memory => "memory",
    }
  }
}

impl Default for ProviderKind {
  fn default() -> Self {
    if cfg!(windows) {
      ProviderKind::Adsi
    } else {
      ProviderKind::Memory
    }
  }
}

impl fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ProviderKind {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "adsi" => Ok(ProviderKind::Adsi),
      "memory" => Ok(ProviderKind::Memory),
      _ => Err(ConfigError::UnknownProvider(s.to_string())),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
  pub provider: ProviderKind,
  /// Directory file served by the memory provider. Without one the memory
  /// provider answers every well-formed binding.
  pub directory: Option<PathBuf>,
}

impl BridgeConfig {
  /// Read `DIRLUA_PROVIDER` and `DIRLUA_DIRECTORY`. Unset or empty variables
  /// fall back to the defaults.
  pub fn from_env() -> Result<Self, ConfigError> {
    let provider = match std::env::var(PROVIDER_ENV) {
      Ok(value) if !value.trim().is_empty() => value.parse()?,
      _ => ProviderKind::default(),
    };
    let directory = std::env::var_os(DIRECTORY_ENV)
      .filter(|v| !v.is_empty())
      .map(PathBuf::from);
    Ok(Self { provider, directory })
  }

  pub fn build_provider(&self) -> Result<Arc<dyn DirectoryProvider>, ConfigError> {
    match self.provider {
      ProviderKind::Memory => {
        let provider = match &self.directory {
          Some(path) => MemoryProvider::from_json_file(path)?,
          None => MemoryProvider::open_directory(),
        };
        Ok(Arc::new(provider))
      }
      #[cfg(windows)]
      ProviderKind::Adsi => Ok(Arc::new(crate::provider::adsi::AdsiProvider::new())),
      #[cfg(not(windows))]
      ProviderKind::Adsi => Err(ConfigError::Unsupported(ProviderKind::Adsi)),
    }
  }
}
