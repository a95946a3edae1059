use std::path::Path;
use std::sync::Arc;

use mlua::prelude::*;

use crate::bridge::Bridge;
use crate::lua::globals;
use crate::runtime::RuntimeLease;

/// Create a Lua runtime with the `dir` global registered.
///
/// The runtime holds a session lease on the directory runtime for as long as
/// it lives, so the runtime is initialized once per Lua state.
pub fn create_runtime(bridge: Arc<Bridge>) -> LuaResult<Lua> {
  let lua = Lua::new();
  let session: RuntimeLease = bridge.session().map_err(LuaError::external)?;
  lua.set_app_data(session);

  globals::register_globals(&lua, bridge)?;

  Ok(lua)
}

fn read_script(path: &Path) -> LuaResult<(String, String)> {
  let canonical_path = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot canonicalize '{}': {}", path.display(), e)))?;
  let content = std::fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;
  Ok((format!("@{}", canonical_path.display()), content))
}

/// Load and execute a Lua file. Only the synchronous `dir` functions are
/// usable from a script run this way.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let (name, content) = read_script(path)?;
  lua.load(&content).set_name(name).eval::<LuaValue>()
}

/// Load and execute a Lua file as an async chunk, so `dir.open_object` can
/// suspend while its bind runs in the background.
pub async fn eval_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let (name, content) = read_script(path)?;
  lua.load(&content).set_name(name).eval_async::<LuaValue>().await
}
