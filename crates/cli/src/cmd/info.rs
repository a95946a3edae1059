use anyhow::Result;

use dirlua_lib::request::ADS_AUTHENTICATION_FLAGS;

use super::{Overrides, resolve_config};
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_info(overrides: &Overrides, output: OutputFormat) -> Result<()> {
  let config = resolve_config(overrides)?;
  let directory = config.directory.as_ref().map(|p| p.display().to_string());
  let platform = format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS);

  if output.is_json() {
    let flags: Vec<_> = ADS_AUTHENTICATION_FLAGS
      .iter()
      .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
      .collect();
    let json_output = serde_json::json!({
      "version": env!("CARGO_PKG_VERSION"),
      "provider": config.provider.as_str(),
      "directory": directory,
      "platform": platform,
      "authentication_flags": flags,
    });
    print_json(&json_output)?;
    return Ok(());
  }

  println!("System:");
  print_stat("Platform", &platform);
  print_stat("Provider", config.provider.as_str());
  if let Some(directory) = &directory {
    print_stat("Directory", directory);
  }
  println!();
  println!("Authentication flags:");
  for (name, value) in ADS_AUTHENTICATION_FLAGS {
    print_stat(name, &format!("0x{:X}", value));
  }

  Ok(())
}
