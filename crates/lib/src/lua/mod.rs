//! Lua runtime and the `dir` global.
//!
//! # Submodules
//!
//! - [`globals`] - The `dir` table (`open_object`, `open_object_sync`, `get_object`, ...)
//! - [`runtime`] - Lua VM creation and script evaluation

pub mod globals;
pub mod runtime;
