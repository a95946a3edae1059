/// Environment variable selecting the directory provider (`adsi` or `memory`).
pub const PROVIDER_ENV: &str = "DIRLUA_PROVIDER";

/// Environment variable pointing at a JSON directory file for the memory provider.
pub const DIRECTORY_ENV: &str = "DIRLUA_DIRECTORY";

/// Name of the global table registered in every Lua runtime.
pub const LUA_GLOBAL: &str = "dir";
