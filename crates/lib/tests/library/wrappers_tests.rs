//! Tests for the objects handed to Lua by the `dir` functions.

use dirlua_lib::provider::memory::MemoryProvider;
use mlua::prelude::*;

use super::common::{TARGET, create_test_runtime};

#[test]
fn explicit_release_happens_once() -> LuaResult<()> {
  let (lua, provider) = create_test_runtime(MemoryProvider::open_directory())?;

  let (first, second, released): (bool, bool, bool) = lua
    .load(format!(
      r#"
        local obj = dir.get_object("{}")
        local first = obj:release()
        local second = obj:release()
        return first, second, obj.released
      "#,
      TARGET
    ))
    .eval()?;

  assert!(first);
  assert!(!second);
  assert!(released);
  assert_eq!(provider.releases(), 1);
  assert_eq!(provider.live_objects(), 0);

  lua.gc_collect()?;
  assert_eq!(provider.releases(), 1, "collecting a released wrapper must not release again");
  assert_eq!(provider.invalid_releases(), 0);
  Ok(())
}

#[test]
fn collected_wrapper_releases_its_object() -> LuaResult<()> {
  let (lua, provider) = create_test_runtime(MemoryProvider::open_directory())?;

  lua
    .load(format!(r#"local obj = dir.get_object("{}")"#, TARGET))
    .exec()?;
  assert_eq!(provider.live_objects(), 1);

  lua.gc_collect()?;
  lua.gc_collect()?;
  assert_eq!(provider.live_objects(), 0);
  assert_eq!(provider.releases(), 1);
  Ok(())
}

#[test]
fn each_capability_gets_its_wrapper() -> LuaResult<()> {
  let (lua, _provider) = create_test_runtime(MemoryProvider::open_directory())?;

  let names: Vec<String> = lua
    .load(format!(
      r#"
        local names = {{}}
        for _, riid in ipairs({{ "IID_IADs", "IID_IADsContainer", "IID_IDirectorySearch", "IID_Unknown" }}) do
          local obj = dir.open_object_sync({{ binding = "{}", riid = riid }})
          names[#names + 1] = tostring(obj):match("^(%a+)%(")
        end
        return names
      "#,
      TARGET
    ))
    .eval()?;

  assert_eq!(
    names,
    vec!["GenericWrapper", "ContainerWrapper", "SearchWrapper", "GenericWrapper"]
  );
  Ok(())
}

#[test]
fn handles_are_distinct_per_bind() -> LuaResult<()> {
  let (lua, _provider) = create_test_runtime(MemoryProvider::open_directory())?;

  let (a, b): (String, String) = lua
    .load(format!(
      r#"
        local a = dir.get_object("{0}")
        local b = dir.get_object("{0}")
        return a.handle, b.handle
      "#,
      TARGET
    ))
    .eval()?;

  assert_eq!(a, "0x0000000000001000");
  assert_eq!(b, "0x0000000000001010");
  Ok(())
}
