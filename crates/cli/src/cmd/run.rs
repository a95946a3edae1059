//! Implementation of the `dirlua run` command.
//!
//! Runs a script as an async chunk so both `dir.open_object` and
//! `dir.open_object_sync` are usable from it.

use std::path::Path;

use anyhow::{Result, anyhow};
use mlua::prelude::*;

use dirlua_lib::lua::runtime::{create_runtime, eval_file};

use super::{Overrides, build_bridge, build_runtime};

pub fn cmd_run(overrides: &Overrides, script: &Path) -> Result<()> {
  let bridge = build_bridge(overrides)?;
  let rt = build_runtime()?;

  let lua = create_runtime(bridge).map_err(|e| anyhow!("Failed to create Lua runtime: {}", e))?;
  let value = rt
    .block_on(eval_file(&lua, script))
    .map_err(|e| anyhow!("{}: {}", script.display(), e))?;

  if !value.is_nil() {
    let tostring: LuaFunction = lua.globals().get("tostring").map_err(|e| anyhow!("{}", e))?;
    let text: String = tostring.call(value).map_err(|e| anyhow!("{}", e))?;
    println!("{}", text);
  }

  Ok(())
}
