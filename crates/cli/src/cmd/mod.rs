mod info;
mod open;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use dirlua_lib::bridge::Bridge;
use dirlua_lib::config::{BridgeConfig, ProviderKind};

pub use info::cmd_info;
pub use open::{OpenArgs, cmd_open};
pub use run::cmd_run;

/// Command-line settings that take precedence over the environment.
#[derive(Debug, Default)]
pub struct Overrides {
  pub provider: Option<ProviderKind>,
  pub directory: Option<PathBuf>,
}

pub fn resolve_config(overrides: &Overrides) -> Result<BridgeConfig> {
  let mut config = BridgeConfig::from_env().context("Invalid environment configuration")?;
  if let Some(provider) = overrides.provider {
    config.provider = provider;
  }
  if let Some(directory) = &overrides.directory {
    config.directory = Some(directory.clone());
  }
  debug!(provider = %config.provider, directory = ?config.directory, "resolved configuration");
  Ok(config)
}

pub fn build_bridge(overrides: &Overrides) -> Result<Arc<Bridge>> {
  let config = resolve_config(overrides)?;
  let provider = config
    .build_provider()
    .with_context(|| format!("Failed to create the {} provider", config.provider))?;
  Ok(Arc::new(Bridge::new(provider)))
}

/// Current-thread runtime; results of background binds are delivered back on
/// the thread that drives it.
pub fn build_runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}
