//! Lua-visible wrappers around bound directory objects.
//!
//! Each wrapper owns the handle it was constructed with and releases it when
//! Lua collects the wrapper or when the script calls `release()`.
//!
//! Fields and methods shared by all wrappers:
//! - `handle` - encoded object identifier
//! - `capability` - capability the object was bound under
//! - `released` - whether the object has been released
//! - `release()` - release the object now; returns false if already released

use mlua::prelude::*;

use crate::handle::{CodecError, EncodedObject, HandleCodec, RawObject};
use crate::request::Capability;

/// Object state shared by every wrapper type.
#[derive(Debug)]
pub struct ObjectRef {
  id: String,
  capability: Capability,
  object: Option<EncodedObject>,
}

impl ObjectRef {
  fn new(object: EncodedObject) -> Self {
    Self {
      id: object.id.clone(),
      capability: object.capability(),
      object: Some(object),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn capability(&self) -> Capability {
    self.capability
  }

  pub fn is_released(&self) -> bool {
    self.object.is_none()
  }

  /// Decode the identifier back to the object it names.
  pub fn raw(&self) -> Result<RawObject, CodecError> {
    HandleCodec::decode(&self.id)
  }

  pub fn release(&mut self) -> bool {
    self.object.take().is_some()
  }
}

pub trait DirectoryObject {
  const TYPE_NAME: &'static str;

  fn object(&self) -> &ObjectRef;

  fn object_mut(&mut self) -> &mut ObjectRef;
}

fn add_object_fields<T, F>(fields: &mut F)
where
  T: DirectoryObject + 'static,
  F: LuaUserDataFields<T>,
{
  fields.add_field_method_get("handle", |_, this| Ok(this.object().id().to_string()));
  fields.add_field_method_get("capability", |_, this| Ok(this.object().capability().as_str()));
  fields.add_field_method_get("released", |_, this| Ok(this.object().is_released()));
}

fn add_object_methods<T, M>(methods: &mut M)
where
  T: DirectoryObject + 'static,
  M: LuaUserDataMethods<T>,
{
  methods.add_method_mut("release", |_, this, ()| Ok(this.object_mut().release()));
  methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
    Ok(format!("{}({})", T::TYPE_NAME, this.object().id()))
  });
}

macro_rules! directory_wrapper {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug)]
    pub struct $name(ObjectRef);

    impl $name {
      pub fn new(object: EncodedObject) -> Self {
        Self(ObjectRef::new(object))
      }
    }

    impl DirectoryObject for $name {
      const TYPE_NAME: &'static str = stringify!($name);

      fn object(&self) -> &ObjectRef {
        &self.0
      }

      fn object_mut(&mut self) -> &mut ObjectRef {
        &mut self.0
      }
    }

    impl LuaUserData for $name {
      fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
        add_object_fields::<Self, F>(fields);
      }

      fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        add_object_methods::<Self, M>(methods);
      }
    }
  };
}

directory_wrapper!(
  /// An object bound as `IADs`.
  GenericWrapper
);
directory_wrapper!(
  /// An object bound as `IADsContainer`.
  ContainerWrapper
);
directory_wrapper!(
  /// An object bound as `IDirectorySearch`.
  SearchWrapper
);
