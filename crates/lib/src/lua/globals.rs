//! The `dir` global table.
//!
//! - `dir.open_object(opts)` - Bind in the background (call from an async chunk)
//! - `dir.open_object_sync(opts)` - Bind on the calling thread
//! - `dir.get_object(binding)` - Bind a generic object with the caller's credentials
//! - `dir.auth` - ADS_AUTHENTICATION_ENUM values by name
//! - `dir.provider` - Name of the active directory provider

use std::sync::Arc;

use mlua::prelude::*;

use crate::bridge::Bridge;
use crate::consts::LUA_GLOBAL;
use crate::error::{BindError, Operation};
use crate::request::{ADS_AUTHENTICATION_FLAGS, BindingRequest, GET_OBJECT_USAGE};

/// Register the `dir` global table in the Lua runtime.
pub fn register_globals(lua: &Lua, bridge: Arc<Bridge>) -> LuaResult<()> {
  let dir = lua.create_table()?;

  dir.set("provider", bridge.provider_name())?;

  let auth = lua.create_table()?;
  for (name, value) in ADS_AUTHENTICATION_FLAGS {
    auth.set(*name, *value)?;
  }
  dir.set("auth", auth)?;

  // Validation runs when the function is called, before the future is
  // created, so malformed options fail without scheduling anything.
  let async_bridge = bridge.clone();
  let open_object = lua.create_async_function(move |_, opts: LuaValue| {
    let bridge = async_bridge.clone();
    let request = BindingRequest::from_lua_value(&opts);
    async move {
      let request = request.map_err(LuaError::external)?;
      bridge
        .open(Operation::OpenObject, request)
        .await
        .map_err(LuaError::external)
    }
  })?;
  dir.set("open_object", open_object)?;

  let sync_bridge = bridge.clone();
  let open_object_sync = lua.create_function(move |_, opts: LuaValue| {
    let request = BindingRequest::from_lua_value(&opts).map_err(LuaError::external)?;
    sync_bridge
      .open_blocking(Operation::OpenObject, request)
      .map_err(LuaError::external)
  })?;
  dir.set("open_object_sync", open_object_sync)?;

  let get_object = lua.create_function(move |_, binding: LuaValue| {
    let binding = match binding {
      LuaValue::String(s) => s.to_str()?.to_string(),
      _ => {
        return Err(LuaError::external(BindError::invalid_argument(
          GET_OBJECT_USAGE,
          "need a binding string",
        )));
      }
    };
    let request = BindingRequest::new(binding)
      .map_err(|_| BindError::invalid_argument(GET_OBJECT_USAGE, "need a binding string"))
      .map_err(LuaError::external)?;
    bridge
      .open_blocking(Operation::GetObject, request)
      .map_err(LuaError::external)
  })?;
  dir.set("get_object", get_object)?;

  lua.globals().set(LUA_GLOBAL, dir)?;

  Ok(())
}
