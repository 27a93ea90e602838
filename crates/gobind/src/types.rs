use std::ffi::{CStr, CString};
use std::fmt;
use std::mem::size_of;
use std::os::raw::c_uint;

use gobind_sys as ffi;

use crate::errors::{BridgeError, Result};
use crate::property;

/// Identity of a type in the native dynamic type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Type(ffi::GType);

impl Type {
    pub const INVALID: Type = Type(ffi::G_TYPE_INVALID);
    pub const NONE: Type = Type(ffi::G_TYPE_NONE);
    pub const INTERFACE: Type = Type(ffi::G_TYPE_INTERFACE);
    pub const CHAR: Type = Type(ffi::G_TYPE_CHAR);
    pub const UCHAR: Type = Type(ffi::G_TYPE_UCHAR);
    pub const BOOL: Type = Type(ffi::G_TYPE_BOOLEAN);
    pub const I32: Type = Type(ffi::G_TYPE_INT);
    pub const U32: Type = Type(ffi::G_TYPE_UINT);
    pub const LONG: Type = Type(ffi::G_TYPE_LONG);
    pub const ULONG: Type = Type(ffi::G_TYPE_ULONG);
    pub const I64: Type = Type(ffi::G_TYPE_INT64);
    pub const U64: Type = Type(ffi::G_TYPE_UINT64);
    pub const ENUM: Type = Type(ffi::G_TYPE_ENUM);
    pub const FLAGS: Type = Type(ffi::G_TYPE_FLAGS);
    pub const F32: Type = Type(ffi::G_TYPE_FLOAT);
    pub const F64: Type = Type(ffi::G_TYPE_DOUBLE);
    pub const STRING: Type = Type(ffi::G_TYPE_STRING);
    pub const POINTER: Type = Type(ffi::G_TYPE_POINTER);
    pub const BOXED: Type = Type(ffi::G_TYPE_BOXED);
    pub const PARAM: Type = Type(ffi::G_TYPE_PARAM);
    pub const OBJECT: Type = Type(ffi::G_TYPE_OBJECT);
    pub const VARIANT: Type = Type(ffi::G_TYPE_VARIANT);

    /// The fundamental types, in id order.
    pub const FUNDAMENTALS: &'static [Type] = &[
        Type::NONE,
        Type::INTERFACE,
        Type::CHAR,
        Type::UCHAR,
        Type::BOOL,
        Type::I32,
        Type::U32,
        Type::LONG,
        Type::ULONG,
        Type::I64,
        Type::U64,
        Type::ENUM,
        Type::FLAGS,
        Type::F32,
        Type::F64,
        Type::STRING,
        Type::POINTER,
        Type::BOXED,
        Type::PARAM,
        Type::OBJECT,
        Type::VARIANT,
    ];

    pub fn initially_unowned() -> Type {
        Type(unsafe { ffi::g_initially_unowned_get_type() })
    }

    pub fn from_glib(type_: ffi::GType) -> Type {
        Type(type_)
    }

    pub fn into_glib(self) -> ffi::GType {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Type::INVALID
    }

    pub fn from_name(name: &str) -> Result<Type> {
        let c_name = CString::new(name)?;
        match unsafe { ffi::g_type_from_name(c_name.as_ptr()) } {
            ffi::G_TYPE_INVALID => Err(BridgeError::UnknownType(name.to_string())),
            id => Ok(Type(id)),
        }
    }

    pub fn name(self) -> String {
        let name = unsafe { ffi::g_type_name(self.0) };
        if name.is_null() {
            return "<invalid>".to_string();
        }
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    }

    /// `None` for fundamental types and unregistered ids.
    pub fn parent(self) -> Option<Type> {
        match unsafe { ffi::g_type_parent(self.0) } {
            ffi::G_TYPE_INVALID => None,
            id => Some(Type(id)),
        }
    }

    pub fn depth(self) -> u32 {
        unsafe { ffi::g_type_depth(self.0) }
    }

    pub fn fundamental(self) -> Type {
        Type(unsafe { ffi::g_type_fundamental(self.0) })
    }

    pub fn is_a(self, ancestor: Type) -> bool {
        unsafe { ffi::g_type_is_a(self.0, ancestor.0) != ffi::GFALSE }
    }

    /// Registers a class deriving from `parent` that adds no class or
    /// instance fields. Its properties are stored by the binding (see
    /// [`crate::property::install`]). Registering the same name under the
    /// same parent again returns the existing type.
    pub fn register_object(name: &str, parent: Type) -> Result<Type> {
        if !parent.is_a(Type::OBJECT) {
            return Err(BridgeError::InvalidType { expected: Type::OBJECT.name(), actual: parent.name() });
        }
        if let Ok(existing) = Type::from_name(name) {
            return existing.expect_parent(parent);
        }

        let c_name = CString::new(name)?;
        let id = unsafe {
            ffi::g_type_register_static_simple(
                parent.into_glib(),
                c_name.as_ptr(),
                size_of::<ffi::GObjectClass>() as c_uint,
                Some(property::class_init),
                size_of::<ffi::GObject>() as c_uint,
                None,
                0,
            )
        };
        if id == ffi::G_TYPE_INVALID {
            // Lost a race with another registration of the same name
            return match Type::from_name(name) {
                Ok(existing) => existing.expect_parent(parent),
                Err(_) => Err(BridgeError::UnknownType(name.to_string())),
            };
        }
        log::debug!("registered type {} (parent {})", name, parent);
        Ok(Type(id))
    }

    fn expect_parent(self, parent: Type) -> Result<Type> {
        match self.parent() {
            Some(p) if p == parent => Ok(self),
            _ => Err(BridgeError::InvalidType { expected: parent.name(), actual: self.name() }),
        }
    }

    /// Walks from this type up to its root, starting with itself.
    pub fn ancestors(self) -> Ancestors {
        Ancestors { next: self.is_valid().then_some(self) }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

pub struct Ancestors {
    next: Option<Type>,
}

impl Iterator for Ancestors {
    type Item = Type;

    fn next(&mut self) -> Option<Type> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}
