use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};

use gobind_sys as ffi;

use crate::errors::{BridgeError, Result};
use crate::types::Type;

/// A native object address adopted without taking a reference.
///
/// The handle must be converted into an [`Object`] before it can outlive
/// the call that produced it. Every conversion consumes the adoption, so
/// an address is sunk or referenced at most once per adoption.
#[derive(Debug)]
#[must_use = "an adopted address holds no reference until it is converted into an Object"]
pub struct Adopted {
    ptr: NonNull<ffi::GObject>,
}

impl Adopted {
    /// # Safety
    /// `ptr` must be NULL or point to a live object.
    pub unsafe fn new(ptr: *mut ffi::GObject) -> Result<Adopted> {
        NonNull::new(ptr).map(|ptr| Adopted { ptr }).ok_or(BridgeError::NullPointer)
    }

    pub fn as_ptr(&self) -> *mut ffi::GObject {
        self.ptr.as_ptr()
    }

    /// Plain discipline: take a new reference.
    pub fn ref_(self) -> Object {
        unsafe { ffi::g_object_ref(self.ptr.as_ptr()) };
        Object { ptr: self.ptr }
    }

    /// Floating discipline: adopt a floating reference, or take a new one
    /// if the object is already owned elsewhere.
    pub fn ref_sink(self) -> Object {
        unsafe { ffi::g_object_ref_sink(self.ptr.as_ptr()) };
        Object { ptr: self.ptr }
    }

    /// The caller already owns a reference (a transfer-full result).
    pub fn assume_owned(self) -> Object {
        Object { ptr: self.ptr }
    }
}

/// A counted reference to a native object. Cloning takes another
/// reference; dropping releases exactly one.
pub struct Object {
    ptr: NonNull<ffi::GObject>,
}

// Native reference counts are atomic.
unsafe impl Send for Object {}
unsafe impl Sync for Object {}

impl Object {
    /// Creates an instance of `type_`. Floating results are sunk, so the
    /// returned handle always owns exactly one reference.
    pub fn new(type_: Type) -> Result<Object> {
        if !type_.is_a(Type::OBJECT) {
            return Err(BridgeError::InvalidType { expected: Type::OBJECT.name(), actual: type_.name() });
        }
        let ptr = unsafe {
            ffi::g_object_new_with_properties(type_.into_glib(), 0, ptr::null_mut(), ptr::null())
        };
        let adopted = unsafe { Adopted::new(ptr)? };
        if unsafe { ffi::g_object_is_floating(ptr) } != ffi::GFALSE {
            Ok(adopted.ref_sink())
        } else {
            Ok(adopted.assume_owned())
        }
    }

    /// Borrowed pointer: takes a new reference.
    ///
    /// # Safety
    /// `ptr` must be NULL or point to a live object.
    pub unsafe fn from_glib_none(ptr: *mut ffi::GObject) -> Option<Object> {
        Adopted::new(ptr).ok().map(Adopted::ref_)
    }

    /// Transfer-full pointer: the reference moves into the handle.
    ///
    /// # Safety
    /// `ptr` must be NULL or point to a live object the caller owns a
    /// reference to.
    pub unsafe fn from_glib_full(ptr: *mut ffi::GObject) -> Option<Object> {
        Adopted::new(ptr).ok().map(Adopted::assume_owned)
    }

    /// Pointer from a constructor that may return a floating reference.
    ///
    /// # Safety
    /// Same as [`Object::from_glib_none`].
    pub unsafe fn from_glib_floating(ptr: *mut ffi::GObject) -> Option<Object> {
        Adopted::new(ptr).ok().map(Adopted::ref_sink)
    }

    pub fn as_ptr(&self) -> *mut ffi::GObject {
        self.ptr.as_ptr()
    }

    pub fn type_(&self) -> Type {
        Type::from_glib(unsafe { ffi::g_type_from_instance(self.ptr.as_ptr() as *const ffi::GTypeInstance) })
    }

    pub fn type_name(&self) -> String {
        self.type_().name()
    }

    pub fn is_a(&self, type_: Type) -> bool {
        self.type_().is_a(type_)
    }

    /// Checks the dynamic type against `expected`, naming both types on failure.
    pub fn typecheck(&self, expected: Type) -> Result<()> {
        if self.is_a(expected) {
            Ok(())
        } else {
            Err(BridgeError::InvalidType { expected: expected.name(), actual: self.type_name() })
        }
    }

    pub fn is_floating(&self) -> bool {
        unsafe { ffi::g_object_is_floating(self.ptr.as_ptr()) != ffi::GFALSE }
    }

    pub fn force_floating(&self) {
        unsafe { ffi::g_object_force_floating(self.ptr.as_ptr()) }
    }

    /// Current native reference count. Only meaningful as a diagnostic.
    pub fn ref_count(&self) -> u32 {
        let count = unsafe { ptr::addr_of!((*self.ptr.as_ptr()).ref_count) as *const AtomicU32 };
        unsafe { (*count).load(Ordering::Acquire) }
    }

    /// Registers a native weak-reference callback.
    ///
    /// # Safety
    /// `notify` must be safe to call with `data` from whatever thread
    /// drops the last reference.
    pub unsafe fn weak_ref(&self, notify: ffi::GWeakNotify, data: ffi::gpointer) {
        ffi::g_object_weak_ref(self.ptr.as_ptr(), notify, data)
    }

    /// # Safety
    /// `notify` and `data` must match an earlier [`Object::weak_ref`].
    pub unsafe fn weak_unref(&self, notify: ffi::GWeakNotify, data: ffi::gpointer) {
        ffi::g_object_weak_unref(self.ptr.as_ptr(), notify, data)
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        unsafe { ffi::g_object_ref(self.ptr.as_ptr()) };
        Object { ptr: self.ptr }
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        unsafe { ffi::g_object_unref(self.ptr.as_ptr()) }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.type_name())
            .field("ptr", &self.ptr)
            .finish()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} at {:p}>", self.type_name(), self.ptr)
    }
}

impl AsRef<Object> for Object {
    fn as_ref(&self) -> &Object {
        self
    }
}

crate::object_wrapper! {
    /// An object created with a floating reference, sunk on adoption.
    pub struct InitiallyUnowned => "GInitiallyUnowned";
}
