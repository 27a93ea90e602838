use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_float, c_int, c_long, c_uint, c_ulong};
use std::ptr;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use super::object::{instance_type, is_live_instance};
use super::return_if_fail;
use super::types::{class_ref, type_is_a, type_name_lossy};
use crate::*;

/// A param spec and what the runtime keeps next to it. Specs live for the
/// rest of the process, as installed ones do in GLib.
#[repr(C)]
struct ParamRec {
    spec: GParamSpec,
    default: GValue,
    name: CString,
}

struct Installed {
    name: CString,
    id: c_uint,
    pspec: usize,
}

lazy_static! {
    /// Owner type -> properties installed on exactly that class.
    static ref PROPERTIES: RwLock<HashMap<GType, Vec<Installed>>> = RwLock::new(HashMap::new());
}

/// Property names start with a letter and continue with letters, digits,
/// `-` or `_`; `_` is stored as `-`.
unsafe fn canonical_name(name: *const c_char) -> Option<CString> {
    if name.is_null() {
        return None;
    }
    let bytes = CStr::from_ptr(name).to_bytes();
    let (first, rest) = bytes.split_first()?;
    if !first.is_ascii_alphabetic() || !rest.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_') {
        return None;
    }
    let canonical: Vec<u8> = bytes.iter().map(|b| if *b == b'_' { b'-' } else { *b }).collect();
    CString::new(canonical).ok()
}

unsafe fn new_param_spec(
    func: &str,
    name: *const c_char,
    value_type: GType,
    flags: GParamFlags,
    mut default: GValue,
) -> *mut GParamSpec {
    let Some(name) = canonical_name(name) else {
        log::error!("{}: assertion 'g_param_spec_is_valid_name (name)' failed", func);
        g_value_unset(&mut default);
        return ptr::null_mut();
    };
    let rec = Box::into_raw(Box::new(ParamRec {
        spec: GParamSpec {
            g_type_instance: GTypeInstance { g_class: ptr::null_mut() },
            name: ptr::null(),
            flags,
            value_type,
            owner_type: G_TYPE_INVALID,
        },
        default,
        name,
    }));
    (*rec).spec.name = (*rec).name.as_ptr();
    rec as *mut GParamSpec
}

unsafe fn default_of(value_type: GType) -> GValue {
    let mut default = GValue::uninit();
    g_value_init(&mut default, value_type);
    default
}

/// Ranged numeric specs. The range only guards the default; values are
/// not clamped on set.
macro_rules! numeric_param_spec {
    ($func:ident, $gtype:expr, $ty:ty, $set:ident) => {
        pub unsafe extern "C" fn $func(
            name: *const c_char,
            _nick: *const c_char,
            _blurb: *const c_char,
            minimum: $ty,
            maximum: $ty,
            default_value: $ty,
            flags: GParamFlags,
        ) -> *mut GParamSpec {
            return_if_fail!(
                minimum <= default_value && default_value <= maximum,
                stringify!($func),
                ptr::null_mut()
            );
            let mut default = default_of($gtype);
            $set(&mut default, default_value);
            new_param_spec(stringify!($func), name, $gtype, flags, default)
        }
    };
}

numeric_param_spec!(g_param_spec_char, G_TYPE_CHAR, i8, g_value_set_schar);
numeric_param_spec!(g_param_spec_uchar, G_TYPE_UCHAR, u8, g_value_set_uchar);
numeric_param_spec!(g_param_spec_int, G_TYPE_INT, c_int, g_value_set_int);
numeric_param_spec!(g_param_spec_uint, G_TYPE_UINT, c_uint, g_value_set_uint);
numeric_param_spec!(g_param_spec_long, G_TYPE_LONG, c_long, g_value_set_long);
numeric_param_spec!(g_param_spec_ulong, G_TYPE_ULONG, c_ulong, g_value_set_ulong);
numeric_param_spec!(g_param_spec_int64, G_TYPE_INT64, i64, g_value_set_int64);
numeric_param_spec!(g_param_spec_uint64, G_TYPE_UINT64, u64, g_value_set_uint64);
numeric_param_spec!(g_param_spec_float, G_TYPE_FLOAT, c_float, g_value_set_float);
numeric_param_spec!(g_param_spec_double, G_TYPE_DOUBLE, c_double, g_value_set_double);

pub unsafe extern "C" fn g_param_spec_boolean(
    name: *const c_char,
    _nick: *const c_char,
    _blurb: *const c_char,
    default_value: gboolean,
    flags: GParamFlags,
) -> *mut GParamSpec {
    let mut default = default_of(G_TYPE_BOOLEAN);
    g_value_set_boolean(&mut default, default_value);
    new_param_spec("g_param_spec_boolean", name, G_TYPE_BOOLEAN, flags, default)
}

pub unsafe extern "C" fn g_param_spec_string(
    name: *const c_char,
    _nick: *const c_char,
    _blurb: *const c_char,
    default_value: *const c_char,
    flags: GParamFlags,
) -> *mut GParamSpec {
    let mut default = default_of(G_TYPE_STRING);
    g_value_set_string(&mut default, default_value);
    new_param_spec("g_param_spec_string", name, G_TYPE_STRING, flags, default)
}

pub unsafe extern "C" fn g_param_spec_pointer(
    name: *const c_char,
    _nick: *const c_char,
    _blurb: *const c_char,
    flags: GParamFlags,
) -> *mut GParamSpec {
    new_param_spec("g_param_spec_pointer", name, G_TYPE_POINTER, flags, default_of(G_TYPE_POINTER))
}

pub unsafe extern "C" fn g_param_spec_object(
    name: *const c_char,
    _nick: *const c_char,
    _blurb: *const c_char,
    object_type: GType,
    flags: GParamFlags,
) -> *mut GParamSpec {
    return_if_fail!(type_is_a(object_type, G_TYPE_OBJECT), "g_param_spec_object", ptr::null_mut());
    new_param_spec("g_param_spec_object", name, object_type, flags, default_of(object_type))
}

pub unsafe extern "C" fn g_param_spec_get_default_value(pspec: *mut GParamSpec) -> *const GValue {
    return_if_fail!(!pspec.is_null(), "g_param_spec_get_default_value", ptr::null());
    ptr::addr_of!((*(pspec as *mut ParamRec)).default)
}

pub unsafe extern "C" fn g_object_class_install_property(
    oclass: *mut GObjectClass,
    property_id: c_uint,
    pspec: *mut GParamSpec,
) {
    return_if_fail!(!oclass.is_null() && !pspec.is_null(), "g_object_class_install_property");
    return_if_fail!(property_id > 0, "g_object_class_install_property");
    let flags = (*pspec).flags;
    if flags & G_PARAM_WRITABLE != 0 {
        return_if_fail!((*oclass).set_property.is_some(), "g_object_class_install_property");
    }
    if flags & G_PARAM_READABLE != 0 {
        return_if_fail!((*oclass).get_property.is_some(), "g_object_class_install_property");
    }

    let owner = (*oclass).g_type_class.g_type;
    let name = CStr::from_ptr((*pspec).name).to_owned();
    let mut properties = PROPERTIES.write();
    let installed = properties.entry(owner).or_default();
    if installed.iter().any(|p| p.name == name) {
        log::warn!(
            "g_object_class_install_property: class '{}' already contains a property named '{}'",
            type_name_lossy(owner),
            name.to_string_lossy()
        );
        return;
    }
    (*pspec).owner_type = owner;
    installed.push(Installed { name, id: property_id, pspec: pspec as usize });
}

/// Finds `name` on `type_` or the nearest ancestor that installed it.
fn lookup(mut type_: GType, name: &CStr) -> Option<(*mut GParamSpec, c_uint)> {
    let properties = PROPERTIES.read();
    while type_ != G_TYPE_INVALID {
        if let Some(found) = properties.get(&type_).and_then(|list| list.iter().find(|p| p.name.as_c_str() == name)) {
            return Some((found.pspec as *mut GParamSpec, found.id));
        }
        type_ = unsafe { g_type_parent(type_) };
    }
    None
}

pub unsafe extern "C" fn g_object_class_find_property(
    oclass: *mut GObjectClass,
    property_name: *const c_char,
) -> *mut GParamSpec {
    return_if_fail!(!oclass.is_null(), "g_object_class_find_property", ptr::null_mut());
    match canonical_name(property_name) {
        Some(name) => lookup((*oclass).g_type_class.g_type, &name).map_or(ptr::null_mut(), |(pspec, _)| pspec),
        None => ptr::null_mut(),
    }
}

/// Resolves a property of a live instance, warning the way GLib does.
unsafe fn resolve(
    func: &str,
    object: *mut GObject,
    property_name: *const c_char,
    access: GParamFlags,
) -> Option<(*mut GParamSpec, c_uint)> {
    let itype = instance_type(object as gpointer);
    let name = canonical_name(property_name)?;
    let Some((pspec, id)) = lookup(itype, &name) else {
        log::warn!(
            "{}: object class '{}' has no property named '{}'",
            func,
            type_name_lossy(itype),
            name.to_string_lossy()
        );
        return None;
    };
    if (*pspec).flags & access == 0 {
        log::warn!(
            "{}: property '{}' of object class '{}' is not {}",
            func,
            name.to_string_lossy(),
            type_name_lossy(itype),
            if access == G_PARAM_WRITABLE { "writable" } else { "readable" }
        );
        return None;
    }
    Some((pspec, id))
}

pub unsafe extern "C" fn g_object_set_property(object: *mut GObject, property_name: *const c_char, value: *const GValue) {
    return_if_fail!(is_live_instance(object as gpointer), "g_object_set_property");
    return_if_fail!(!value.is_null() && (*value).g_type != G_TYPE_INVALID, "g_object_set_property");
    let Some((pspec, id)) = resolve("g_object_set_property", object, property_name, G_PARAM_WRITABLE) else {
        return;
    };

    let value_type = (*pspec).value_type;
    let mut converted = default_of(value_type);
    if g_value_type_transformable((*value).g_type, value_type) == GFALSE
        || g_value_transform(value, &mut converted) == GFALSE
    {
        log::warn!(
            "g_object_set_property: unable to set property '{}' of type '{}' from value of type '{}'",
            CStr::from_ptr((*pspec).name).to_string_lossy(),
            type_name_lossy(value_type),
            type_name_lossy((*value).g_type)
        );
        g_value_unset(&mut converted);
        return;
    }

    let class = class_ref((*pspec).owner_type) as *mut GObjectClass;
    if let Some(set) = (*class).set_property {
        set(object, id, &converted, pspec);
    }
    g_value_unset(&mut converted);
}

pub unsafe extern "C" fn g_object_get_property(object: *mut GObject, property_name: *const c_char, value: *mut GValue) {
    return_if_fail!(is_live_instance(object as gpointer), "g_object_get_property");
    return_if_fail!(!value.is_null() && (*value).g_type != G_TYPE_INVALID, "g_object_get_property");
    let Some((pspec, id)) = resolve("g_object_get_property", object, property_name, G_PARAM_READABLE) else {
        return;
    };

    let value_type = (*pspec).value_type;
    let mut current = default_of(value_type);
    let class = class_ref((*pspec).owner_type) as *mut GObjectClass;
    if let Some(get) = (*class).get_property {
        get(object, id, &mut current, pspec);
    }
    if g_value_transform(&current, value) == GFALSE {
        log::warn!(
            "g_object_get_property: can't retrieve property '{}' of type '{}' as value of type '{}'",
            CStr::from_ptr((*pspec).name).to_string_lossy(),
            type_name_lossy(value_type),
            type_name_lossy((*value).g_type)
        );
    }
    g_value_unset(&mut current);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    use parking_lot::Mutex;

    /// The one stored `int` behind every instance of the test class.
    static STORED: Mutex<c_int> = parking_lot::const_mutex(0);

    unsafe extern "C" fn set_width(_object: *mut GObject, id: c_uint, value: *const GValue, _pspec: *mut GParamSpec) {
        assert_eq!(id, 7);
        *STORED.lock() = g_value_get_int(value);
    }

    unsafe extern "C" fn get_width(_object: *mut GObject, id: c_uint, value: *mut GValue, _pspec: *mut GParamSpec) {
        assert_eq!(id, 7);
        g_value_set_int(value, *STORED.lock());
    }

    unsafe extern "C" fn class_init(g_class: gpointer, _data: gpointer) {
        let class = g_class as *mut GObjectClass;
        (*class).set_property = Some(set_width);
        (*class).get_property = Some(get_width);
    }

    #[test]
    fn test_install_set_and_get() {
        unsafe {
            let name = CString::new("ShimParamBox").unwrap();
            let itype = g_type_register_static_simple(
                G_TYPE_OBJECT,
                name.as_ptr(),
                size_of::<GObjectClass>() as c_uint,
                Some(class_init),
                size_of::<GObject>() as c_uint,
                None,
                0,
            );
            let class = g_type_class_ref(itype) as *mut GObjectClass;

            let prop = CString::new("box_width").unwrap();
            let pspec = g_param_spec_int(prop.as_ptr(), ptr::null(), ptr::null(), 0, 100, 5, G_PARAM_READWRITE);
            assert_eq!(CStr::from_ptr((*pspec).name).to_str().unwrap(), "box-width");
            assert_eq!(g_value_get_int(g_param_spec_get_default_value(pspec)), 5);
            g_object_class_install_property(class, 7, pspec);
            assert_eq!((*pspec).owner_type, itype);

            let dashed = CString::new("box-width").unwrap();
            assert_eq!(g_object_class_find_property(class, dashed.as_ptr()), pspec);
            let missing = CString::new("box-height").unwrap();
            assert!(g_object_class_find_property(class, missing.as_ptr()).is_null());

            // An int64 input is transformed to the declared type
            let object = g_object_new_with_properties(itype, 0, ptr::null_mut(), ptr::null());
            let mut input = GValue::uninit();
            g_value_init(&mut input, G_TYPE_INT64);
            g_value_set_int64(&mut input, 42);
            g_object_set_property(object, prop.as_ptr(), &input);
            assert_eq!(*STORED.lock(), 42);

            let mut output = GValue::uninit();
            g_value_init(&mut output, G_TYPE_DOUBLE);
            g_object_get_property(object, dashed.as_ptr(), &mut output);
            assert_eq!(g_value_get_double(&output), 42.0);

            // A string cannot become an int; the stored value is untouched
            let mut text = GValue::uninit();
            g_value_init(&mut text, G_TYPE_STRING);
            g_object_set_property(object, prop.as_ptr(), &text);
            assert_eq!(*STORED.lock(), 42);

            g_value_unset(&mut text);
            g_object_unref(object);
        }
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        unsafe {
            let bad = CString::new("9lives").unwrap();
            assert!(g_param_spec_boolean(bad.as_ptr(), ptr::null(), ptr::null(), GFALSE, G_PARAM_READWRITE).is_null());
            let spaced = CString::new("two words").unwrap();
            assert!(g_param_spec_pointer(spaced.as_ptr(), ptr::null(), ptr::null(), G_PARAM_READABLE).is_null());
        }
    }
}
