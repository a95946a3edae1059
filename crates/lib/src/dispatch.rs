//! Selecting the wrapper type for a bound object.

use mlua::prelude::*;

use crate::handle::{ForeignObjectHandle, HandleCodec};
use crate::request::Capability;
use crate::wrapper::{ContainerWrapper, DirectoryObject, GenericWrapper, ObjectRef, SearchWrapper};

/// The wrapper delivered to the caller for a successful bind.
#[derive(Debug)]
pub enum CapabilityWrapper {
  Generic(GenericWrapper),
  Container(ContainerWrapper),
  Search(SearchWrapper),
}

impl CapabilityWrapper {
  pub fn type_name(&self) -> &'static str {
    match self {
      CapabilityWrapper::Generic(_) => GenericWrapper::TYPE_NAME,
      CapabilityWrapper::Container(_) => ContainerWrapper::TYPE_NAME,
      CapabilityWrapper::Search(_) => SearchWrapper::TYPE_NAME,
    }
  }

  pub fn object(&self) -> &ObjectRef {
    match self {
      CapabilityWrapper::Generic(w) => w.object(),
      CapabilityWrapper::Container(w) => w.object(),
      CapabilityWrapper::Search(w) => w.object(),
    }
  }

  pub fn object_mut(&mut self) -> &mut ObjectRef {
    match self {
      CapabilityWrapper::Generic(w) => w.object_mut(),
      CapabilityWrapper::Container(w) => w.object_mut(),
      CapabilityWrapper::Search(w) => w.object_mut(),
    }
  }
}

impl IntoLua for CapabilityWrapper {
  fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
    let userdata = match self {
      CapabilityWrapper::Generic(w) => lua.create_userdata(w)?,
      CapabilityWrapper::Container(w) => lua.create_userdata(w)?,
      CapabilityWrapper::Search(w) => lua.create_userdata(w)?,
    };
    Ok(LuaValue::UserData(userdata))
  }
}

pub struct CapabilityDispatcher;

impl CapabilityDispatcher {
  /// Encode the handle and move it into the wrapper for its capability.
  pub fn dispatch(handle: ForeignObjectHandle) -> CapabilityWrapper {
    let object = HandleCodec::encode_handle(handle);
    match object.capability() {
      Capability::GenericObject => CapabilityWrapper::Generic(GenericWrapper::new(object)),
      Capability::Container => CapabilityWrapper::Container(ContainerWrapper::new(object)),
      Capability::DirectorySearch => CapabilityWrapper::Search(SearchWrapper::new(object)),
    }
  }
}
