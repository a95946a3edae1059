use std::sync::Arc;

use dirlua_lib::bridge::Bridge;
use dirlua_lib::lua::runtime::create_runtime;
use dirlua_lib::provider::memory::MemoryProvider;
use mlua::prelude::*;

pub const TARGET: &str = "LDAP://server/CN=x,DC=y";

/// Lua runtime backed by `provider`, with the provider returned for inspection.
pub fn create_test_runtime(provider: MemoryProvider) -> LuaResult<(Lua, Arc<MemoryProvider>)> {
  let provider = Arc::new(provider);
  let lua = create_runtime(Arc::new(Bridge::new(provider.clone())))?;
  Ok((lua, provider))
}
