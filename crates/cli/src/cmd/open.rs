//! Implementation of the `dirlua open` command.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use serde::Serialize;

use dirlua_lib::error::Operation;
use dirlua_lib::request::{ADS_AUTHENTICATION_FLAGS, BindingRequest, Capability, flag_names, lookup_flag};

use super::{Overrides, build_bridge, build_runtime};
use crate::output::{OutputFormat, print_json, print_stat, print_success};

pub struct OpenArgs {
  pub binding: String,
  pub user: Option<String>,
  pub password: Option<String>,
  pub auth: Vec<String>,
  pub capability: Option<String>,
  pub sync: bool,
}

#[derive(Debug, Serialize)]
struct OpenReport {
  binding: String,
  wrapper: &'static str,
  handle: String,
  capability: &'static str,
  auth_flags: u32,
  auth_names: Vec<&'static str>,
  mode: &'static str,
  elapsed_ms: u128,
}

/// Resolve one `--auth` value: a flag name, a `0x` hex number or a decimal.
fn parse_auth(value: &str) -> Result<u32> {
  let value = value.trim();
  if let Some(flag) = lookup_flag(ADS_AUTHENTICATION_FLAGS, value) {
    return Ok(flag);
  }
  let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
    Some(hex) => u32::from_str_radix(hex, 16).ok(),
    None => value.parse::<u32>().ok(),
  };
  match parsed {
    Some(flag) => Ok(flag),
    None => bail!("unknown authentication flag '{}'", value),
  }
}

fn build_request(args: OpenArgs) -> Result<BindingRequest> {
  let capability = Capability::from_tag(args.capability.as_deref());
  let mut request = BindingRequest::new(args.binding)?.with_capability(capability);
  if let Some(user) = args.user {
    request = request.with_user(user);
  }
  if let Some(password) = args.password {
    request = request.with_password(password);
  }
  if !args.auth.is_empty() {
    let mut flags = 0;
    for value in &args.auth {
      flags |= parse_auth(value)?;
    }
    request = request.with_auth_flags(flags);
  }
  Ok(request)
}

pub fn cmd_open(overrides: &Overrides, args: OpenArgs, output: OutputFormat) -> Result<()> {
  let sync = args.sync;
  let request = build_request(args)?;
  let binding = request.target_uri().to_string();
  let auth_flags = request.auth_flags();
  let bridge = build_bridge(overrides)?;
  // Keeps the runtime up until the wrapper below is released.
  let _session = bridge.session()?;

  let started = Instant::now();
  let wrapper = if sync {
    bridge.open_blocking(Operation::OpenObject, request)?
  } else {
    let rt = build_runtime()?;
    rt.block_on(bridge.open(Operation::OpenObject, request))?
  };
  let elapsed = started.elapsed();

  let report = OpenReport {
    binding,
    wrapper: wrapper.type_name(),
    handle: wrapper.object().id().to_string(),
    capability: wrapper.object().capability().as_str(),
    auth_flags,
    auth_names: flag_names(ADS_AUTHENTICATION_FLAGS, auth_flags),
    mode: if sync { "sync" } else { "async" },
    elapsed_ms: elapsed.as_millis(),
  };

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_success(&format!("Bound {}", report.binding));
    print_stat("Wrapper", report.wrapper);
    print_stat("Handle", &report.handle);
    print_stat("Capability", report.capability);
    print_stat("Auth", &format_auth(report.auth_flags, &report.auth_names));
    print_stat("Mode", report.mode);
    print_stat("Elapsed", &format_elapsed(elapsed));
  }

  Ok(())
}

fn format_auth(flags: u32, names: &[&str]) -> String {
  if names.is_empty() {
    format!("0x{:X}", flags)
  } else {
    format!("0x{:X} ({})", flags, names.join(" | "))
  }
}

fn format_elapsed(elapsed: Duration) -> String {
  // Sub-millisecond precision is noise for a network bind.
  humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}
