//! Statically typed wrappers over [`Object`].
//!
//! A wrapper is a newtype around an `Object` that knows the class it
//! expects. Declare one with [`object_wrapper!`](crate::object_wrapper).

use std::sync::OnceLock;

use gobind_sys as ffi;

use crate::config::{self, TypecheckPolicy};
use crate::object::Object;
use crate::types::Type;

pub trait ObjectType: Clone + Send + Sync + 'static {
    /// Registered name of the native class.
    const CLASS_NAME: &'static str;

    /// The native type, or `Type::INVALID` while the class is unregistered.
    fn static_type() -> Type;

    fn as_object(&self) -> &Object;

    /// Wraps `object` without checking its type.
    fn from_object_unchecked(object: Object) -> Self;

    /// The pointer to hand to native calls. A type mismatch is reported
    /// according to the configured policy, but the pointer is returned
    /// either way.
    fn native(&self) -> *mut ffi::GObject {
        let object = self.as_object();
        if let Err(err) = object.typecheck(Self::static_type()) {
            match config::typecheck_policy() {
                TypecheckPolicy::Warn => log::warn!("{}: {}", Self::CLASS_NAME, err),
                TypecheckPolicy::Strict => panic!("{}: {}", Self::CLASS_NAME, err),
            }
        }
        object.as_ptr()
    }

    fn upcast(self) -> Object {
        self.as_object().clone()
    }
}

impl ObjectType for Object {
    const CLASS_NAME: &'static str = "GObject";

    fn static_type() -> Type {
        Type::OBJECT
    }

    fn as_object(&self) -> &Object {
        self
    }

    fn from_object_unchecked(object: Object) -> Self {
        object
    }

    fn upcast(self) -> Object {
        self
    }
}

/// Resolves `class_name` once it is registered and caches the result.
#[doc(hidden)]
pub fn cached_type(cell: &OnceLock<Type>, class_name: &str) -> Type {
    if let Some(type_) = cell.get() {
        return *type_;
    }
    match Type::from_name(class_name) {
        Ok(type_) => *cell.get_or_init(|| type_),
        Err(_) => Type::INVALID,
    }
}

impl Object {
    /// Checked conversion into a wrapper; hands the object back on a mismatch.
    pub fn downcast<T: ObjectType>(self) -> std::result::Result<T, Object> {
        let target = T::static_type();
        if target.is_valid() && self.is_a(target) {
            Ok(T::from_object_unchecked(self))
        } else {
            Err(self)
        }
    }

    pub fn is<T: ObjectType>(&self) -> bool {
        let target = T::static_type();
        target.is_valid() && self.is_a(target)
    }
}

/// Declares a wrapper type for a native class.
///
/// ```ignore
/// gobind::object_wrapper! {
///     /// A push button.
///     pub struct Button => "GtkButton";
/// }
/// ```
#[macro_export]
macro_rules! object_wrapper {
    ($(#[$attr:meta])* $vis:vis struct $name:ident => $class:literal;) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        $vis struct $name($crate::Object);

        impl $crate::ObjectType for $name {
            const CLASS_NAME: &'static str = $class;

            fn static_type() -> $crate::Type {
                static TYPE: ::std::sync::OnceLock<$crate::Type> = ::std::sync::OnceLock::new();
                $crate::wrapper::cached_type(&TYPE, $class)
            }

            fn as_object(&self) -> &$crate::Object {
                &self.0
            }

            fn from_object_unchecked(object: $crate::Object) -> Self {
                $name(object)
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::Object;

            fn deref(&self) -> &$crate::Object {
                &self.0
            }
        }

        impl ::std::convert::AsRef<$crate::Object> for $name {
            fn as_ref(&self) -> &$crate::Object {
                &self.0
            }
        }

        impl ::std::convert::From<$name> for $crate::Object {
            fn from(wrapper: $name) -> $crate::Object {
                wrapper.0
            }
        }
    };
}
