//! dirlua-lib: directory objects for Lua scripts.
//!
//! This crate binds directory objects by URI through a foreign directory
//! runtime (ADSI on Windows) and hands them to Lua as wrapper objects:
//! - `BindingRequest`: one validated bind request
//! - `ObjectBinder`: the blocking foreign open call
//! - `AsyncBindTask`: runs a bind on the blocking pool
//! - `CapabilityDispatcher`: picks the wrapper type for a bound object
//! - `Bridge`: the pipeline shared by the synchronous and asynchronous paths

pub mod binder;
pub mod bridge;
pub mod config;
pub mod consts;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod lua;
pub mod provider;
pub mod request;
pub mod runtime;
pub mod status;
pub mod task;
pub mod wrapper;
