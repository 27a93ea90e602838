//! Object properties.
//!
//! Reading and writing goes through the native property API for any
//! class. Classes registered with [`Type::register_object`] additionally
//! accept new properties through [`install`]; their values live in a table
//! here, keyed by instance address and dropped when the instance is
//! finalized.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_long, c_uint, c_ulong};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use gobind_sys as ffi;
use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::errors::{BridgeError, Result};
use crate::object::Object;
use crate::types::Type;
use crate::value::{Dynamic, Value};

/// What the class knows about one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Canonical name, with `-` in place of `_`
    pub name: String,
    pub value_type: Type,
    /// The class that installed the property
    pub owner: Type,
    pub readable: bool,
    pub writable: bool,
}

struct Stored(Value);

// Stored values are only reached under the table lock.
unsafe impl Send for Stored {}

lazy_static! {
    /// Instance address -> property id -> current value.
    static ref VALUES: Mutex<HashMap<usize, HashMap<c_uint, Stored>>> = Mutex::new(HashMap::new());
}

/// Property ids only need to be unique per class; one counter covers all.
static NEXT_PROPERTY_ID: AtomicU32 = AtomicU32::new(1);

/// Class initializer for binding-registered classes.
pub(crate) unsafe extern "C" fn class_init(g_class: ffi::gpointer, _class_data: ffi::gpointer) {
    let class = g_class as *mut ffi::GObjectClass;
    (*class).set_property = Some(store_property);
    (*class).get_property = Some(load_property);
}

unsafe extern "C" fn store_property(
    object: *mut ffi::GObject,
    property_id: c_uint,
    value: *const ffi::GValue,
    _pspec: *mut ffi::GParamSpec,
) {
    let copy = Stored(Value::from_glib_borrow(value));
    let (first, replaced) = {
        let mut values = VALUES.lock();
        let first = !values.contains_key(&(object as usize));
        let replaced = values.entry(object as usize).or_default().insert(property_id, copy);
        (first, replaced)
    };
    // The old value may hold the last reference to another object
    drop(replaced);
    if first {
        ffi::g_object_weak_ref(object, Some(forget_instance), ptr::null_mut());
    }
}

unsafe extern "C" fn load_property(
    object: *mut ffi::GObject,
    property_id: c_uint,
    value: *mut ffi::GValue,
    pspec: *mut ffi::GParamSpec,
) {
    let current = VALUES
        .lock()
        .get(&(object as usize))
        .and_then(|props| props.get(&property_id))
        .map(|stored| stored.0.clone());
    match current {
        Some(current) => ffi::g_value_copy(current.as_ptr(), value),
        None => {
            let default = ffi::g_param_spec_get_default_value(pspec);
            if !default.is_null() {
                ffi::g_value_copy(default, value);
            }
        }
    }
}

unsafe extern "C" fn forget_instance(_data: ffi::gpointer, object: *mut ffi::GObject) {
    let removed = VALUES.lock().remove(&(object as usize));
    if let Some(removed) = removed {
        log::trace!("dropping {} stored properties of {:p}", removed.len(), object);
    }
}

fn stores_properties(class: *const ffi::GObjectClass) -> bool {
    type Setter = unsafe extern "C" fn(*mut ffi::GObject, c_uint, *const ffi::GValue, *mut ffi::GParamSpec);
    let setter = unsafe { (*class).set_property };
    setter.map(|f| f as usize) == Some(store_property as Setter as usize)
}

/// # Safety
/// `pspec` must point to a live param spec.
unsafe fn describe(pspec: *const ffi::GParamSpec) -> PropertyInfo {
    let flags = (*pspec).flags;
    PropertyInfo {
        name: CStr::from_ptr((*pspec).name).to_string_lossy().into_owned(),
        value_type: Type::from_glib((*pspec).value_type),
        owner: Type::from_glib((*pspec).owner_type),
        readable: flags & ffi::G_PARAM_READABLE != 0,
        writable: flags & ffi::G_PARAM_WRITABLE != 0,
    }
}

/// # Safety
/// `class` must point to a live object class.
unsafe fn find_in_class(class: *mut ffi::GObjectClass, name: &str) -> Result<PropertyInfo> {
    let c_name = CString::new(name)?;
    let pspec = ffi::g_object_class_find_property(class, c_name.as_ptr());
    if pspec.is_null() {
        return Err(BridgeError::UnknownProperty {
            property: name.to_string(),
            type_name: Type::from_glib((*class).g_type_class.g_type).name(),
        });
    }
    Ok(describe(pspec))
}

/// A read-write param spec of `value_type` with a zero default and the
/// full range of the type.
unsafe fn param_spec(name: &CStr, value_type: Type) -> Result<*mut ffi::GParamSpec> {
    let (n, nick, blurb) = (name.as_ptr(), ptr::null(), ptr::null());
    let flags = ffi::G_PARAM_READWRITE;
    let pspec = match value_type.fundamental() {
        Type::BOOL => ffi::g_param_spec_boolean(n, nick, blurb, ffi::GFALSE, flags),
        Type::CHAR => ffi::g_param_spec_char(n, nick, blurb, i8::MIN, i8::MAX, 0, flags),
        Type::UCHAR => ffi::g_param_spec_uchar(n, nick, blurb, u8::MIN, u8::MAX, 0, flags),
        Type::I32 => ffi::g_param_spec_int(n, nick, blurb, c_int::MIN, c_int::MAX, 0, flags),
        Type::U32 => ffi::g_param_spec_uint(n, nick, blurb, c_uint::MIN, c_uint::MAX, 0, flags),
        Type::LONG => ffi::g_param_spec_long(n, nick, blurb, c_long::MIN, c_long::MAX, 0, flags),
        Type::ULONG => ffi::g_param_spec_ulong(n, nick, blurb, c_ulong::MIN, c_ulong::MAX, 0, flags),
        Type::I64 => ffi::g_param_spec_int64(n, nick, blurb, i64::MIN, i64::MAX, 0, flags),
        Type::U64 => ffi::g_param_spec_uint64(n, nick, blurb, u64::MIN, u64::MAX, 0, flags),
        Type::F32 => ffi::g_param_spec_float(n, nick, blurb, f32::MIN, f32::MAX, 0.0, flags),
        Type::F64 => ffi::g_param_spec_double(n, nick, blurb, f64::MIN, f64::MAX, 0.0, flags),
        Type::STRING => ffi::g_param_spec_string(n, nick, blurb, ptr::null(), flags),
        Type::POINTER => ffi::g_param_spec_pointer(n, nick, blurb, flags),
        Type::OBJECT => ffi::g_param_spec_object(n, nick, blurb, value_type.into_glib(), flags),
        _ => return Err(BridgeError::ConversionNotImplemented(value_type.name())),
    };
    if pspec.is_null() {
        return Err(BridgeError::InvalidPropertyName(name.to_string_lossy().into_owned()));
    }
    Ok(pspec)
}

/// Installs a read-write property on a class registered with
/// [`Type::register_object`]. Installing the same name and type again
/// returns the existing property.
///
/// Install properties before the class is derived from.
pub fn install(owner: Type, name: &str, value_type: Type) -> Result<PropertyInfo> {
    if !owner.is_a(Type::OBJECT) {
        return Err(BridgeError::InvalidType { expected: Type::OBJECT.name(), actual: owner.name() });
    }
    // Installed properties keep the class alive
    let class = unsafe { ffi::g_type_class_ref(owner.into_glib()) } as *mut ffi::GObjectClass;
    if class.is_null() {
        return Err(BridgeError::NullPointer);
    }
    if !stores_properties(class) {
        return Err(BridgeError::ForeignClass(owner.name()));
    }

    if let Ok(existing) = unsafe { find_in_class(class, name) } {
        if existing.owner == owner {
            return if existing.value_type == value_type {
                Ok(existing)
            } else {
                Err(BridgeError::InvalidType { expected: existing.value_type.name(), actual: value_type.name() })
            };
        }
    }

    let c_name = CString::new(name)?;
    let id = NEXT_PROPERTY_ID.fetch_add(1, Ordering::Relaxed);
    unsafe {
        let pspec = param_spec(&c_name, value_type)?;
        ffi::g_object_class_install_property(class, id, pspec);
    }
    log::debug!("installed property {}::{} of type {} (id {})", owner, name, value_type, id);
    unsafe { find_in_class(class, name) }
}

impl Object {
    fn class(&self) -> *mut ffi::GObjectClass {
        unsafe { (*self.as_ptr()).g_type_instance.g_class as *mut ffi::GObjectClass }
    }

    /// Looks a property up on this object's class and its ancestors.
    pub fn find_property(&self, name: &str) -> Result<PropertyInfo> {
        unsafe { find_in_class(self.class(), name) }
    }

    /// Sets one property, converting `value` to the declared type first.
    pub fn set_property(&self, name: &str, value: &Dynamic) -> Result<()> {
        let info = self.find_property(name)?;
        if !info.writable {
            return Err(BridgeError::PropertyAccess {
                property: info.name,
                type_name: self.type_name(),
                access: "writable",
            });
        }
        let value = Value::from_managed_as(value, info.value_type)?;
        let c_name = CString::new(name)?;
        unsafe { ffi::g_object_set_property(self.as_ptr(), c_name.as_ptr(), value.as_ptr()) };
        Ok(())
    }

    /// Reads one property into its managed form.
    pub fn property(&self, name: &str) -> Result<Dynamic> {
        let info = self.find_property(name)?;
        if !info.readable {
            return Err(BridgeError::PropertyAccess {
                property: info.name,
                type_name: self.type_name(),
                access: "readable",
            });
        }
        let mut value = Value::for_type(info.value_type);
        let c_name = CString::new(name)?;
        unsafe { ffi::g_object_get_property(self.as_ptr(), c_name.as_ptr(), value.as_mut_ptr()) };
        value.to_managed()
    }
}
