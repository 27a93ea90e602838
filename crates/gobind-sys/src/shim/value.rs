use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_float, c_int, c_long, c_uint, c_ulong};
use std::ptr;

use super::object::instance_type;
use super::return_if_fail;
use super::types::{type_fundamental, type_is_a, type_name_lossy};
use crate::*;

const NUMERIC_FUNDAMENTALS: &[GType] = &[
    G_TYPE_CHAR,
    G_TYPE_UCHAR,
    G_TYPE_BOOLEAN,
    G_TYPE_INT,
    G_TYPE_UINT,
    G_TYPE_LONG,
    G_TYPE_ULONG,
    G_TYPE_INT64,
    G_TYPE_UINT64,
    G_TYPE_FLOAT,
    G_TYPE_DOUBLE,
];

fn is_numeric(type_: GType) -> bool {
    NUMERIC_FUNDAMENTALS.contains(&type_fundamental(type_))
}

unsafe fn holds(value: *const GValue, fundamental: GType) -> bool {
    !value.is_null() && type_fundamental((*value).g_type) == fundamental
}

/// Releases whatever the payload owns; leaves the type in place.
unsafe fn release_payload(value: *mut GValue) {
    match type_fundamental((*value).g_type) {
        G_TYPE_STRING => {
            let s = (*value).data[0].v_pointer as *mut c_char;
            if !s.is_null() {
                drop(CString::from_raw(s));
            }
        }
        G_TYPE_OBJECT => {
            let object = (*value).data[0].v_pointer as *mut GObject;
            if !object.is_null() {
                g_object_unref(object);
            }
        }
        _ => {}
    }
    (*value).data = GValue::uninit().data;
}

unsafe fn dup_string(s: *const c_char) -> gpointer {
    if s.is_null() {
        return ptr::null_mut();
    }
    CStr::from_ptr(s).to_owned().into_raw() as gpointer
}

pub unsafe extern "C" fn g_value_init(value: *mut GValue, g_type: GType) -> *mut GValue {
    return_if_fail!(!value.is_null(), "g_value_init", value);
    if (*value).g_type != G_TYPE_INVALID {
        log::error!(
            "g_value_init: cannot initialize GValue with type '{}', the value has already been initialized as '{}'",
            type_name_lossy(g_type),
            type_name_lossy((*value).g_type)
        );
        return value;
    }
    let fundamental = type_fundamental(g_type);
    return_if_fail!(
        fundamental != G_TYPE_INVALID && fundamental != G_TYPE_NONE,
        "g_value_init",
        value
    );
    (*value).g_type = g_type;
    (*value).data = GValue::uninit().data;
    value
}

pub unsafe extern "C" fn g_value_unset(value: *mut GValue) {
    if value.is_null() || (*value).g_type == G_TYPE_INVALID {
        return;
    }
    release_payload(value);
    (*value).g_type = G_TYPE_INVALID;
}

pub unsafe extern "C" fn g_value_copy(src_value: *const GValue, dest_value: *mut GValue) {
    return_if_fail!(!src_value.is_null() && !dest_value.is_null(), "g_value_copy");
    return_if_fail!(
        type_is_a((*src_value).g_type, (*dest_value).g_type),
        "g_value_copy"
    );
    if ptr::eq(src_value, dest_value) {
        return;
    }
    release_payload(dest_value);
    match type_fundamental((*src_value).g_type) {
        G_TYPE_STRING => {
            (*dest_value).data[0].v_pointer = dup_string((*src_value).data[0].v_pointer as *const c_char);
        }
        G_TYPE_OBJECT => {
            let object = (*src_value).data[0].v_pointer as *mut GObject;
            if !object.is_null() {
                g_object_ref(object);
            }
            (*dest_value).data[0].v_pointer = object as gpointer;
        }
        _ => (*dest_value).data = (*src_value).data,
    }
}

pub unsafe extern "C" fn g_value_type_compatible(src_type: GType, dest_type: GType) -> gboolean {
    type_is_a(src_type, dest_type) as gboolean
}

pub unsafe extern "C" fn g_value_type_transformable(src_type: GType, dest_type: GType) -> gboolean {
    (type_is_a(src_type, dest_type) || (is_numeric(src_type) && is_numeric(dest_type))) as gboolean
}

/// Numeric payloads widened for C-style conversion.
enum Number {
    Int(i128),
    Float(f64),
}

unsafe fn read_number(value: *const GValue) -> Option<Number> {
    let data = (*value).data[0];
    Some(match type_fundamental((*value).g_type) {
        G_TYPE_CHAR | G_TYPE_INT => Number::Int(data.v_int as i128),
        G_TYPE_BOOLEAN => Number::Int((data.v_int != 0) as i128),
        G_TYPE_UCHAR | G_TYPE_UINT => Number::Int(data.v_uint as i128),
        G_TYPE_LONG => Number::Int(data.v_long as i128),
        G_TYPE_ULONG => Number::Int(data.v_ulong as i128),
        G_TYPE_INT64 => Number::Int(data.v_int64 as i128),
        G_TYPE_UINT64 => Number::Int(data.v_uint64 as i128),
        G_TYPE_FLOAT => Number::Float(data.v_float as f64),
        G_TYPE_DOUBLE => Number::Float(data.v_double),
        _ => return None,
    })
}

unsafe fn write_number(value: *mut GValue, number: Number) -> bool {
    let (int, float) = match number {
        Number::Int(i) => (i, i as f64),
        Number::Float(f) => (f as i128, f),
    };
    let data = &mut (*value).data[0];
    match type_fundamental((*value).g_type) {
        G_TYPE_CHAR => data.v_int = int as i8 as c_int,
        G_TYPE_UCHAR => data.v_uint = int as u8 as c_uint,
        G_TYPE_BOOLEAN => data.v_int = (float != 0.0) as c_int,
        G_TYPE_INT => data.v_int = int as c_int,
        G_TYPE_UINT => data.v_uint = int as c_uint,
        G_TYPE_LONG => data.v_long = int as c_long,
        G_TYPE_ULONG => data.v_ulong = int as c_ulong,
        G_TYPE_INT64 => data.v_int64 = int as i64,
        G_TYPE_UINT64 => data.v_uint64 = int as u64,
        G_TYPE_FLOAT => data.v_float = float as c_float,
        G_TYPE_DOUBLE => data.v_double = float,
        _ => return false,
    }
    true
}

pub unsafe extern "C" fn g_value_transform(src_value: *const GValue, dest_value: *mut GValue) -> gboolean {
    return_if_fail!(!src_value.is_null() && !dest_value.is_null(), "g_value_transform", GFALSE);
    if type_is_a((*src_value).g_type, (*dest_value).g_type) {
        g_value_copy(src_value, dest_value);
        return GTRUE;
    }
    match read_number(src_value) {
        Some(number) => {
            release_payload(dest_value);
            write_number(dest_value, number) as gboolean
        }
        None => GFALSE,
    }
}

macro_rules! scalar_accessors {
    ($set:ident, $get:ident, $fundamental:expr, $field:ident, $ty:ty, $store:ty) => {
        pub unsafe extern "C" fn $set(value: *mut GValue, v: $ty) {
            return_if_fail!(holds(value, $fundamental), stringify!($set));
            (*value).data[0].$field = v as $store;
        }

        pub unsafe extern "C" fn $get(value: *const GValue) -> $ty {
            return_if_fail!(holds(value, $fundamental), stringify!($get), Default::default());
            (*value).data[0].$field as $ty
        }
    };
}

scalar_accessors!(g_value_set_schar, g_value_get_schar, G_TYPE_CHAR, v_int, i8, c_int);
scalar_accessors!(g_value_set_uchar, g_value_get_uchar, G_TYPE_UCHAR, v_uint, u8, c_uint);
scalar_accessors!(g_value_set_int, g_value_get_int, G_TYPE_INT, v_int, c_int, c_int);
scalar_accessors!(g_value_set_uint, g_value_get_uint, G_TYPE_UINT, v_uint, c_uint, c_uint);
scalar_accessors!(g_value_set_long, g_value_get_long, G_TYPE_LONG, v_long, c_long, c_long);
scalar_accessors!(g_value_set_ulong, g_value_get_ulong, G_TYPE_ULONG, v_ulong, c_ulong, c_ulong);
scalar_accessors!(g_value_set_int64, g_value_get_int64, G_TYPE_INT64, v_int64, i64, i64);
scalar_accessors!(g_value_set_uint64, g_value_get_uint64, G_TYPE_UINT64, v_uint64, u64, u64);
scalar_accessors!(g_value_set_float, g_value_get_float, G_TYPE_FLOAT, v_float, c_float, c_float);
scalar_accessors!(g_value_set_double, g_value_get_double, G_TYPE_DOUBLE, v_double, c_double, c_double);

pub unsafe extern "C" fn g_value_set_boolean(value: *mut GValue, v_boolean: gboolean) {
    return_if_fail!(holds(value, G_TYPE_BOOLEAN), "g_value_set_boolean");
    (*value).data[0].v_int = (v_boolean != GFALSE) as c_int;
}

pub unsafe extern "C" fn g_value_get_boolean(value: *const GValue) -> gboolean {
    return_if_fail!(holds(value, G_TYPE_BOOLEAN), "g_value_get_boolean", GFALSE);
    (*value).data[0].v_int
}

pub unsafe extern "C" fn g_value_set_pointer(value: *mut GValue, v_pointer: gpointer) {
    return_if_fail!(holds(value, G_TYPE_POINTER), "g_value_set_pointer");
    (*value).data[0].v_pointer = v_pointer;
}

pub unsafe extern "C" fn g_value_get_pointer(value: *const GValue) -> gpointer {
    return_if_fail!(holds(value, G_TYPE_POINTER), "g_value_get_pointer", ptr::null_mut());
    (*value).data[0].v_pointer
}

pub unsafe extern "C" fn g_value_set_string(value: *mut GValue, v_string: *const c_char) {
    return_if_fail!(holds(value, G_TYPE_STRING), "g_value_set_string");
    let copy = dup_string(v_string);
    release_payload(value);
    (*value).data[0].v_pointer = copy;
}

pub unsafe extern "C" fn g_value_get_string(value: *const GValue) -> *const c_char {
    return_if_fail!(holds(value, G_TYPE_STRING), "g_value_get_string", ptr::null());
    (*value).data[0].v_pointer as *const c_char
}

pub unsafe extern "C" fn g_value_set_object(value: *mut GValue, v_object: gpointer) {
    return_if_fail!(holds(value, G_TYPE_OBJECT), "g_value_set_object");
    if !v_object.is_null() {
        return_if_fail!(
            type_is_a(instance_type(v_object), (*value).g_type),
            "g_value_set_object"
        );
        g_object_ref(v_object as *mut GObject);
    }
    release_payload(value);
    (*value).data[0].v_pointer = v_object;
}

pub unsafe extern "C" fn g_value_get_object(value: *const GValue) -> *mut GObject {
    return_if_fail!(holds(value, G_TYPE_OBJECT), "g_value_get_object", ptr::null_mut());
    (*value).data[0].v_pointer as *mut GObject
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_values_own_their_copy() {
        unsafe {
            let mut value = GValue::uninit();
            g_value_init(&mut value, G_TYPE_STRING);
            let text = CString::new("label").unwrap();
            g_value_set_string(&mut value, text.as_ptr());
            drop(text);
            assert_eq!(CStr::from_ptr(g_value_get_string(&value)).to_str().unwrap(), "label");

            let mut copy = GValue::uninit();
            g_value_init(&mut copy, G_TYPE_STRING);
            g_value_copy(&value, &mut copy);
            g_value_unset(&mut value);
            assert_eq!(CStr::from_ptr(g_value_get_string(&copy)).to_str().unwrap(), "label");
            g_value_unset(&mut copy);
            assert_eq!(copy.g_type, G_TYPE_INVALID);
        }
    }

    #[test]
    fn test_numeric_transform() {
        unsafe {
            let mut src = GValue::uninit();
            g_value_init(&mut src, G_TYPE_INT);
            g_value_set_int(&mut src, 42);

            let mut dest = GValue::uninit();
            g_value_init(&mut dest, G_TYPE_INT64);
            assert_eq!(g_value_transform(&src, &mut dest), GTRUE);
            assert_eq!(g_value_get_int64(&dest), 42);

            let mut text = GValue::uninit();
            g_value_init(&mut text, G_TYPE_STRING);
            assert_eq!(g_value_transform(&src, &mut text), GFALSE);
            g_value_unset(&mut text);
        }
    }

    #[test]
    fn test_mismatched_getter_returns_zero() {
        unsafe {
            let mut value = GValue::uninit();
            g_value_init(&mut value, G_TYPE_DOUBLE);
            g_value_set_double(&mut value, 2.5);
            assert_eq!(g_value_get_int(&value), 0);
            assert_eq!(g_value_get_double(&value), 2.5);
        }
    }
}
