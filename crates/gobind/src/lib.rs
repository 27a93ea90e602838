//! Safe bindings over the GObject object model.
//!
//! The crate bridges the native dynamic type system into Rust. It covers
//! type identity, the dynamic value container, counted object handles and
//! their properties, closures dispatched back into Rust during signal
//! emission, and main-loop callback sources. Widget-level wrappers are
//! declared on top with [`object_wrapper!`].

#[cfg(test)]
mod tests;

pub mod cast;
pub mod closure;
pub mod config;
pub mod errors;
pub mod object;
pub mod property;
pub mod signal;
pub mod source;
pub mod types;
pub mod value;
pub mod wrapper;

pub use gobind_sys as ffi;

pub use cast::{AnyObject, ClassTable};
pub use closure::{Closure, Handler, HandlerReturn};
pub use config::{BridgeConfig, TypecheckPolicy};
pub use errors::{BridgeError, Result};
pub use object::{Adopted, InitiallyUnowned, Object};
pub use property::PropertyInfo;
pub use signal::{SignalFlags, SignalHandlerId, SignalInfo};
pub use source::{idle_add, source_remove, timeout_add, MainContext, MainLoop, SourceId};
pub use types::Type;
pub use value::{Dynamic, FromDynamic, Value, ValueType};
pub use wrapper::ObjectType;
