//! Tests for `dir` functions driven from async Lua chunks.

use std::time::Duration;

use dirlua_lib::provider::memory::{DirectoryEntry, MemoryProvider};
use dirlua_lib::status::E_ADS_BAD_PATHNAME;
use mlua::prelude::*;

use super::common::{TARGET, create_test_runtime};

#[tokio::test]
async fn overlapping_chunks_resolve_independently() -> LuaResult<()> {
  let (lua, provider) = create_test_runtime(
    MemoryProvider::open_directory()
      .with_latency(Duration::from_millis(20))
      .with_failures(|n| (n == 1).then_some(E_ADS_BAD_PATHNAME)),
  )?;

  let chunk = |riid: &'static str| {
    lua
      .load(format!(
        r#"
          local ok, obj = pcall(dir.open_object, {{ binding = "{}", riid = "{}" }})
          if ok then return tostring(obj) end
          return "failed"
        "#,
        TARGET, riid
      ))
      .eval_async::<String>()
  };

  let (first, second, third) = tokio::join!(
    chunk("IID_IADs"),
    chunk("IID_IADsContainer"),
    chunk("IID_IDirectorySearch")
  );
  let results = [first?, second?, third?];

  assert_eq!(results.iter().filter(|r| r.as_str() == "failed").count(), 1);
  assert_eq!(provider.calls(), 3);
  Ok(())
}

#[tokio::test]
async fn sync_and_async_share_error_text() -> LuaResult<()> {
  let (lua, _provider) = create_test_runtime(MemoryProvider::new(vec![DirectoryEntry::new(TARGET)]))?;

  let (sync_err, async_err): (String, String) = lua
    .load(
      r#"
        local opts = { binding = "LDAP://server/CN=missing,DC=y" }
        local _, sync_err = pcall(dir.open_object_sync, opts)
        local _, async_err = pcall(dir.open_object, opts)
        return tostring(sync_err), tostring(async_err)
      "#,
    )
    .eval_async()
    .await?;

  assert!(sync_err.contains("error in ADsOpenObject: There is no such object on the server"));
  assert!(async_err.contains("error in ADsOpenObject: There is no such object on the server"));
  Ok(())
}

#[tokio::test]
async fn credentials_reach_the_provider() -> LuaResult<()> {
  let (lua, provider) = create_test_runtime(MemoryProvider::new(vec![
    DirectoryEntry::new(TARGET).with_credentials("alice", "secret"),
  ]))?;

  let handle: String = lua
    .load(format!(
      r#"
        local obj = dir.open_object({{
          binding = "{}",
          user = "alice",
          password = "secret",
          authenticationFlag = {{ dir.auth.ADS_SECURE_AUTHENTICATION, "ADS_SERVER_BIND" }},
        }})
        return obj.handle
      "#,
      TARGET
    ))
    .eval_async()
    .await?;

  assert_eq!(handle, "0x0000000000001000");
  let seen = &provider.seen_calls()[0];
  assert_eq!(seen.user.as_deref(), Some("alice"));
  assert_eq!(seen.auth_flags, 0x201);
  Ok(())
}

#[tokio::test]
async fn wrong_password_is_a_logon_failure() -> LuaResult<()> {
  let (lua, provider) = create_test_runtime(MemoryProvider::new(vec![
    DirectoryEntry::new(TARGET).with_credentials("alice", "secret"),
  ]))?;

  let message: String = lua
    .load(format!(
      r#"
        local ok, err = pcall(dir.open_object, {{ binding = "{}", user = "alice", password = "nope" }})
        assert(not ok)
        return tostring(err)
      "#,
      TARGET
    ))
    .eval_async()
    .await?;

  assert!(message.contains("0x8007052E"), "{}", message);
  assert!(!message.contains("nope"), "{}", message);
  assert_eq!(provider.live_objects(), 0);
  Ok(())
}
