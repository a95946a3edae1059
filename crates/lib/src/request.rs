//! Bind requests and the option tables used to build them.
//!
//! A [`BindingRequest`] is validated once, from the Lua options table, and is
//! immutable afterwards. The same request type feeds the synchronous and the
//! asynchronous bind paths.

use std::fmt;

use mlua::prelude::*;

use crate::error::BindError;

pub const OPEN_OBJECT_USAGE: &str = "dir.open_object({\n  binding: string,\n  user?: string,\n  password?: string,\n  authenticationFlag?: ADS_AUTHENTICATION_ENUM | ADS_AUTHENTICATION_ENUM[],\n  riid?: \"IID_IADs\" | \"IID_IADsContainer\" | \"IID_IDirectorySearch\"\n})";

pub const GET_OBJECT_USAGE: &str = "dir.get_object(binding: string)";

pub const ADS_SECURE_AUTHENTICATION: u32 = 0x1;
pub const ADS_NO_AUTHENTICATION: u32 = 0x10;

/// ADS_AUTHENTICATION_ENUM, by name.
pub const ADS_AUTHENTICATION_FLAGS: &[(&str, u32)] = &[
  ("ADS_SECURE_AUTHENTICATION", ADS_SECURE_AUTHENTICATION),
  ("ADS_USE_ENCRYPTION", 0x2),
  ("ADS_USE_SSL", 0x2),
  ("ADS_READONLY_SERVER", 0x4),
  ("ADS_PROMPT_CREDENTIALS", 0x8),
  ("ADS_NO_AUTHENTICATION", ADS_NO_AUTHENTICATION),
  ("ADS_FAST_BIND", 0x20),
  ("ADS_USE_SIGNING", 0x40),
  ("ADS_USE_SEALING", 0x80),
  ("ADS_USE_DELEGATION", 0x100),
  ("ADS_SERVER_BIND", 0x200),
  ("ADS_NO_REFERRAL_CHASING", 0x400),
  ("ADS_AUTH_RESERVED", 0x8000_0000),
];

/// A COM interface identifier stored as its 128-bit registry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId(pub u128);

impl InterfaceId {
  pub const IADS: InterfaceId = InterfaceId(0xFD8256D0_FD15_11CE_ABC4_02608C9E7553);
  pub const IADS_CONTAINER: InterfaceId = InterfaceId(0x001677D0_FD16_11CE_ABC4_02608C9E7553);
  pub const IDIRECTORY_SEARCH: InterfaceId = InterfaceId(0x109BA8EC_92F0_11D0_A790_00C04FD8D5A8);
}

impl fmt::Display for InterfaceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let v = self.0;
    write!(
      f,
      "{{{:08X}-{:04X}-{:04X}-{:04X}-{:012X}}}",
      (v >> 96) as u32,
      (v >> 80) as u16,
      (v >> 64) as u16,
      (v >> 48) as u16,
      v & 0xFFFF_FFFF_FFFF
    )
  }
}

/// The interface a directory object is requested under.
///
/// The set is closed: every tag resolves to one of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Capability {
  #[default]
  GenericObject,
  Container,
  DirectorySearch,
}

impl Capability {
  /// Resolve a capability tag. Absent and unrecognized tags fall back to
  /// [`Capability::GenericObject`].
  pub fn from_tag(tag: Option<&str>) -> Self {
    match tag {
      Some("Container" | "IID_IADsContainer") => Capability::Container,
      Some("DirectorySearch" | "IID_IDirectorySearch") => Capability::DirectorySearch,
      _ => Capability::GenericObject,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Capability::GenericObject => "GenericObject",
      Capability::Container => "Container",
      Capability::DirectorySearch => "DirectorySearch",
    }
  }

  pub fn interface_id(self) -> InterfaceId {
    match self {
      Capability::GenericObject => InterfaceId::IADS,
      Capability::Container => InterfaceId::IADS_CONTAINER,
      Capability::DirectorySearch => InterfaceId::IDIRECTORY_SEARCH,
    }
  }
}

impl fmt::Display for Capability {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One validated bind operation.
#[derive(Clone, PartialEq, Eq)]
pub struct BindingRequest {
  target_uri: String,
  user: Option<String>,
  password: Option<String>,
  auth_flags: u32,
  capability: Capability,
}

impl BindingRequest {
  /// Start a request for `target_uri` with no credentials, secure
  /// authentication and the generic capability.
  pub fn new(target_uri: impl Into<String>) -> Result<Self, BindError> {
    let target_uri = target_uri.into();
    if target_uri.is_empty() {
      return Err(BindError::invalid_argument(
        OPEN_OBJECT_USAGE,
        "binding string must not be empty",
      ));
    }
    Ok(Self {
      target_uri,
      user: None,
      password: None,
      auth_flags: ADS_SECURE_AUTHENTICATION,
      capability: Capability::GenericObject,
    })
  }

  pub fn with_user(mut self, user: impl Into<String>) -> Self {
    self.user = Some(user.into());
    self
  }

  pub fn with_password(mut self, password: impl Into<String>) -> Self {
    self.password = Some(password.into());
    self
  }

  pub fn with_auth_flags(mut self, auth_flags: u32) -> Self {
    self.auth_flags = auth_flags;
    self
  }

  pub fn with_capability(mut self, capability: Capability) -> Self {
    self.capability = capability;
    self
  }

  /// Build a request from the options table passed to `dir.open_object`.
  ///
  /// Recognized fields: `binding` (or `uri`), `user`, `password`,
  /// `authenticationFlag`, `riid` (or `capability`).
  pub fn from_lua_value(value: &LuaValue) -> Result<Self, BindError> {
    let LuaValue::Table(table) = value else {
      return Err(BindError::invalid_argument(
        OPEN_OBJECT_USAGE,
        format!("expected an options table, got {}", value.type_name()),
      ));
    };

    let binding = match optional_string(table, "binding")? {
      Some(binding) => Some(binding),
      None => optional_string(table, "uri")?,
    };
    let Some(binding) = binding else {
      return Err(BindError::invalid_argument(OPEN_OBJECT_USAGE, "need a binding string"));
    };

    let mut request = BindingRequest::new(binding)?;
    request.user = optional_string(table, "user")?;
    request.password = optional_string(table, "password")?;

    let flag = table
      .get::<LuaValue>("authenticationFlag")
      .map_err(|e| BindError::invalid_argument(OPEN_OBJECT_USAGE, e.to_string()))?;
    request.auth_flags = resolve_flag(&flag, ADS_AUTHENTICATION_FLAGS, ADS_SECURE_AUTHENTICATION)?;

    let tag = match optional_string(table, "riid")? {
      Some(tag) => Some(tag),
      None => optional_string(table, "capability")?,
    };
    request.capability = Capability::from_tag(tag.as_deref());

    Ok(request)
  }

  pub fn target_uri(&self) -> &str {
    &self.target_uri
  }

  pub fn user(&self) -> Option<&str> {
    self.user.as_deref()
  }

  pub fn password(&self) -> Option<&str> {
    self.password.as_deref()
  }

  pub fn auth_flags(&self) -> u32 {
    self.auth_flags
  }

  pub fn capability(&self) -> Capability {
    self.capability
  }
}

impl fmt::Debug for BindingRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BindingRequest")
      .field("target_uri", &self.target_uri)
      .field("user", &self.user)
      .field("password", &self.password.as_ref().map(|_| "********"))
      .field("auth_flags", &format_args!("0x{:X}", self.auth_flags))
      .field("capability", &self.capability)
      .finish()
  }
}

/// Read an optional string field. A present field keeps its exact value,
/// including the empty string.
fn optional_string(table: &LuaTable, key: &str) -> Result<Option<String>, BindError> {
  let value: LuaValue = table
    .get(key)
    .map_err(|e| BindError::invalid_argument(OPEN_OBJECT_USAGE, e.to_string()))?;
  match value {
    LuaValue::Nil => Ok(None),
    LuaValue::String(s) => s
      .to_str()
      .map(|s| Some(s.to_string()))
      .map_err(|e| BindError::invalid_argument(OPEN_OBJECT_USAGE, format!("field '{}': {}", key, e))),
    other => Err(BindError::invalid_argument(
      OPEN_OBJECT_USAGE,
      format!("field '{}' must be a string, got {}", key, other.type_name()),
    )),
  }
}

/// Resolve a flag option against a name table.
///
/// Accepts nil (the default), an integer, a flag name, or an array of
/// integers and names which are OR-ed together.
pub fn resolve_flag(value: &LuaValue, table: &[(&str, u32)], default: u32) -> Result<u32, BindError> {
  match value {
    LuaValue::Nil => Ok(default),
    LuaValue::Table(items) => {
      let mut flags = 0;
      for item in items.sequence_values::<LuaValue>() {
        let item = item.map_err(|e| BindError::invalid_argument(OPEN_OBJECT_USAGE, e.to_string()))?;
        if matches!(item, LuaValue::Table(_) | LuaValue::Nil) {
          return Err(BindError::invalid_argument(
            OPEN_OBJECT_USAGE,
            "authentication flag arrays may only contain names or integers",
          ));
        }
        flags |= resolve_flag(&item, table, default)?;
      }
      Ok(flags)
    }
    other => resolve_single_flag(other, table),
  }
}

/// Find a flag by exact name.
pub fn lookup_flag(table: &[(&str, u32)], name: &str) -> Option<u32> {
  table.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

/// Names of the flags set in `flags`, in table order. Aliases sharing a value
/// are reported once, under the first name.
pub fn flag_names(table: &[(&'static str, u32)], flags: u32) -> Vec<&'static str> {
  let mut seen = 0u32;
  let mut names = Vec::new();
  for (name, value) in table {
    if *value != 0 && flags & value == *value && seen & value != *value {
      seen |= value;
      names.push(*name);
    }
  }
  names
}

fn resolve_single_flag(value: &LuaValue, table: &[(&str, u32)]) -> Result<u32, BindError> {
  match value {
    LuaValue::Integer(i) => u32::try_from(*i)
      .map_err(|_| BindError::invalid_argument(OPEN_OBJECT_USAGE, format!("flag value {} is out of range", i))),
    LuaValue::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64 => Ok(*n as u32),
    LuaValue::String(s) => {
      let name = s
        .to_str()
        .map_err(|e| BindError::invalid_argument(OPEN_OBJECT_USAGE, e.to_string()))?;
      lookup_flag(table, &name).ok_or_else(|| {
        BindError::invalid_argument(OPEN_OBJECT_USAGE, format!("unknown authentication flag '{}'", &*name))
      })
    }
    other => Err(BindError::invalid_argument(
      OPEN_OBJECT_USAGE,
      format!("invalid authentication flag of type {}", other.type_name()),
    )),
  }
}
