use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_long, c_ulong};
use std::ptr;

use gobind_sys as ffi;

use crate::errors::{BridgeError, Result};
use crate::object::Object;
use crate::types::Type;

/// Managed side of a dynamic value.
///
/// `I16`, `U16` and `List` have no native counterpart and are rejected by
/// [`Value::from_managed`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    None,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    Long(c_long),
    ULong(c_ulong),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Object(Option<Object>),
    Pointer(ffi::gpointer),
    List(Vec<Dynamic>),
}

impl Dynamic {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Dynamic::None => "none",
            Dynamic::Bool(_) => "bool",
            Dynamic::I8(_) => "i8",
            Dynamic::U8(_) => "u8",
            Dynamic::I16(_) => "i16",
            Dynamic::U16(_) => "u16",
            Dynamic::I32(_) => "i32",
            Dynamic::U32(_) => "u32",
            Dynamic::Long(_) => "long",
            Dynamic::ULong(_) => "ulong",
            Dynamic::I64(_) => "i64",
            Dynamic::U64(_) => "u64",
            Dynamic::F32(_) => "f32",
            Dynamic::F64(_) => "f64",
            Dynamic::String(_) => "string",
            Dynamic::Object(_) => "object",
            Dynamic::Pointer(_) => "pointer",
            Dynamic::List(_) => "list",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Dynamic::None)
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::None => write!(f, "none"),
            Dynamic::Bool(b) => write!(f, "{}", b),
            Dynamic::I8(i) => write!(f, "{}", i),
            Dynamic::U8(i) => write!(f, "{}", i),
            Dynamic::I16(i) => write!(f, "{}", i),
            Dynamic::U16(i) => write!(f, "{}", i),
            Dynamic::I32(i) => write!(f, "{}", i),
            Dynamic::U32(i) => write!(f, "{}", i),
            Dynamic::Long(i) => write!(f, "{}", i),
            Dynamic::ULong(i) => write!(f, "{}", i),
            Dynamic::I64(i) => write!(f, "{}", i),
            Dynamic::U64(i) => write!(f, "{}", i),
            Dynamic::F32(x) => write!(f, "{}", x),
            Dynamic::F64(x) => write!(f, "{}", x),
            Dynamic::String(s) => write!(f, "{}", s),
            Dynamic::Object(Some(object)) => write!(f, "{}", object),
            Dynamic::Object(None) => write!(f, "<null object>"),
            Dynamic::Pointer(p) => write!(f, "{:p}", *p),
            Dynamic::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! dynamic_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Dynamic {
                fn from(v: $ty) -> Self {
                    Dynamic::$variant(v)
                }
            }
        )*
    };
}

dynamic_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Option<Object> => Object,
    Vec<Dynamic> => List,
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<Object> for Dynamic {
    fn from(object: Object) -> Self {
        Dynamic::Object(Some(object))
    }
}

impl From<()> for Dynamic {
    fn from(_: ()) -> Self {
        Dynamic::None
    }
}

/// Typed extraction of a [`Dynamic`], used for handler arguments.
///
/// A mismatched variant is a broken assumption about the signal's
/// parameter types, so extraction panics rather than returning an error.
pub trait FromDynamic: Sized {
    fn from_dynamic(value: Dynamic) -> Self;
}

fn mismatch(expected: &str, got: &Dynamic) -> ! {
    panic!("expected a {} argument, got {} ({})", expected, got.kind(), got)
}

macro_rules! from_dynamic {
    ($($ty:ty => $name:literal: $($pat:pat => $out:expr),+;)*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(value: Dynamic) -> Self {
                    match value {
                        $($pat => $out,)+
                        other => mismatch($name, &other),
                    }
                }
            }
        )*
    };
}

from_dynamic! {
    bool => "bool": Dynamic::Bool(b) => b;
    i8 => "i8": Dynamic::I8(i) => i;
    u8 => "u8": Dynamic::U8(i) => i;
    i32 => "i32": Dynamic::I32(i) => i;
    u32 => "u32": Dynamic::U32(i) => i;
    // `long` is never wider than 64 bits
    i64 => "i64": Dynamic::I64(i) => i, Dynamic::Long(i) => i as i64;
    u64 => "u64": Dynamic::U64(i) => i, Dynamic::ULong(i) => i as u64;
    f32 => "f32": Dynamic::F32(x) => x;
    f64 => "f64": Dynamic::F64(x) => x;
    String => "string": Dynamic::String(s) => s;
    Option<String> => "string": Dynamic::String(s) => Some(s), Dynamic::None => None;
    Object => "object": Dynamic::Object(Some(object)) => object;
    Option<Object> => "object": Dynamic::Object(object) => object;
    ffi::gpointer => "pointer": Dynamic::Pointer(p) => p;
}

impl FromDynamic for Dynamic {
    fn from_dynamic(value: Dynamic) -> Self {
        value
    }
}

/// Rust types with a fixed native value type, for typed access to a [`Value`].
pub trait ValueType: Sized {
    fn static_type() -> Type;

    /// # Safety
    /// `value` must be initialized with a type whose fundamental is
    /// `static_type()`'s.
    unsafe fn read(value: *const ffi::GValue) -> Self;

    /// # Safety
    /// Same as [`ValueType::read`].
    unsafe fn write(value: *mut ffi::GValue, v: Self);
}

macro_rules! value_type {
    ($($ty:ty => $gtype:ident, $get:ident, $set:ident;)*) => {
        $(
            impl ValueType for $ty {
                fn static_type() -> Type {
                    Type::$gtype
                }

                unsafe fn read(value: *const ffi::GValue) -> Self {
                    ffi::$get(value) as $ty
                }

                unsafe fn write(value: *mut ffi::GValue, v: Self) {
                    ffi::$set(value, v as _)
                }
            }
        )*
    };
}

value_type! {
    i8 => CHAR, g_value_get_schar, g_value_set_schar;
    u8 => UCHAR, g_value_get_uchar, g_value_set_uchar;
    i32 => I32, g_value_get_int, g_value_set_int;
    u32 => U32, g_value_get_uint, g_value_set_uint;
    i64 => I64, g_value_get_int64, g_value_set_int64;
    u64 => U64, g_value_get_uint64, g_value_set_uint64;
    f32 => F32, g_value_get_float, g_value_set_float;
    f64 => F64, g_value_get_double, g_value_set_double;
}

impl ValueType for bool {
    fn static_type() -> Type {
        Type::BOOL
    }

    unsafe fn read(value: *const ffi::GValue) -> Self {
        ffi::g_value_get_boolean(value) != ffi::GFALSE
    }

    unsafe fn write(value: *mut ffi::GValue, v: Self) {
        ffi::g_value_set_boolean(value, v as ffi::gboolean)
    }
}

impl ValueType for ffi::gpointer {
    fn static_type() -> Type {
        Type::POINTER
    }

    unsafe fn read(value: *const ffi::GValue) -> Self {
        ffi::g_value_get_pointer(value)
    }

    unsafe fn write(value: *mut ffi::GValue, v: Self) {
        ffi::g_value_set_pointer(value, v)
    }
}

impl ValueType for Option<Object> {
    fn static_type() -> Type {
        Type::OBJECT
    }

    unsafe fn read(value: *const ffi::GValue) -> Self {
        Object::from_glib_none(ffi::g_value_get_object(value))
    }

    unsafe fn write(value: *mut ffi::GValue, v: Self) {
        let ptr = v.as_ref().map_or(ptr::null_mut(), |object| object.as_ptr());
        ffi::g_value_set_object(value, ptr as ffi::gpointer)
    }
}

/// An initialized native `GValue`, unset exactly once on drop.
#[repr(transparent)]
pub struct Value {
    inner: ffi::GValue,
}

impl Value {
    /// A zeroed value of `type_`.
    pub fn for_type(type_: Type) -> Value {
        let mut value = Value { inner: ffi::GValue::uninit() };
        unsafe { ffi::g_value_init(&mut value.inner, type_.into_glib()) };
        value
    }

    /// Copies a borrowed native value.
    ///
    /// # Safety
    /// `value` must point to an initialized `GValue`.
    pub unsafe fn from_glib_borrow(value: *const ffi::GValue) -> Value {
        let mut copy = Value::for_type(Type::from_glib((*value).g_type));
        ffi::g_value_copy(value, &mut copy.inner);
        copy
    }

    /// Takes over an initialized native value without copying it.
    pub fn from_glib_full(value: ffi::GValue) -> Value {
        Value { inner: value }
    }

    /// Releases ownership of the native value to the caller.
    pub fn into_raw(self) -> ffi::GValue {
        let inner = self.inner;
        std::mem::forget(self);
        inner
    }

    pub fn as_ptr(&self) -> *const ffi::GValue {
        &self.inner
    }

    pub fn as_mut_ptr(&mut self) -> *mut ffi::GValue {
        &mut self.inner
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.g_type != ffi::G_TYPE_INVALID
    }

    /// The actual and fundamental type of the value.
    ///
    /// Panics on an uninitialized value.
    pub fn value_type(&self) -> (Type, Type) {
        if !self.is_initialized() {
            panic!("tried to read the type of an uninitialized value");
        }
        let actual = Type::from_glib(self.inner.g_type);
        (actual, actual.fundamental())
    }

    /// Builds a native value from a managed one.
    pub fn from_managed(value: &Dynamic) -> Result<Value> {
        let unsupported = || Err(BridgeError::ConversionNotImplemented(value.kind().to_string()));
        let mut out = match value {
            Dynamic::I16(_) | Dynamic::U16(_) | Dynamic::List(_) => return unsupported(),
            Dynamic::Object(Some(object)) => Value::for_type(object.type_()),
            Dynamic::Object(None) => Value::for_type(Type::OBJECT),
            // A missing value travels as a null pointer
            Dynamic::None | Dynamic::Pointer(_) => Value::for_type(Type::POINTER),
            Dynamic::Bool(_) => Value::for_type(Type::BOOL),
            Dynamic::I8(_) => Value::for_type(Type::CHAR),
            Dynamic::U8(_) => Value::for_type(Type::UCHAR),
            Dynamic::I32(_) => Value::for_type(Type::I32),
            Dynamic::U32(_) => Value::for_type(Type::U32),
            Dynamic::Long(_) => Value::for_type(Type::LONG),
            Dynamic::ULong(_) => Value::for_type(Type::ULONG),
            Dynamic::I64(_) => Value::for_type(Type::I64),
            Dynamic::U64(_) => Value::for_type(Type::U64),
            Dynamic::F32(_) => Value::for_type(Type::F32),
            Dynamic::F64(_) => Value::for_type(Type::F64),
            Dynamic::String(_) => Value::for_type(Type::STRING),
        };

        let raw = out.as_mut_ptr();
        unsafe {
            match value {
                Dynamic::None => ffi::g_value_set_pointer(raw, ptr::null_mut()),
                Dynamic::Pointer(p) => ffi::g_value_set_pointer(raw, *p),
                Dynamic::Bool(b) => bool::write(raw, *b),
                Dynamic::I8(i) => i8::write(raw, *i),
                Dynamic::U8(i) => u8::write(raw, *i),
                Dynamic::I32(i) => i32::write(raw, *i),
                Dynamic::U32(i) => u32::write(raw, *i),
                Dynamic::Long(i) => ffi::g_value_set_long(raw, *i),
                Dynamic::ULong(i) => ffi::g_value_set_ulong(raw, *i),
                Dynamic::I64(i) => i64::write(raw, *i),
                Dynamic::U64(i) => u64::write(raw, *i),
                Dynamic::F32(x) => f32::write(raw, *x),
                Dynamic::F64(x) => f64::write(raw, *x),
                Dynamic::String(s) => {
                    let s = CString::new(s.as_str())?;
                    ffi::g_value_set_string(raw, s.as_ptr());
                }
                Dynamic::Object(object) => Option::<Object>::write(raw, object.clone()),
                Dynamic::I16(_) | Dynamic::U16(_) | Dynamic::List(_) => return unsupported(),
            }
        }
        Ok(out)
    }

    /// Builds a native value of exactly `target`, converting through
    /// [`Value::transform_to`] when the managed value maps to another type.
    /// `Dynamic::None` and a null object become the NULL payload of any
    /// object, string or pointer target.
    pub fn from_managed_as(value: &Dynamic, target: Type) -> Result<Value> {
        let is_null = matches!(value, Dynamic::None | Dynamic::Object(None));
        if is_null && matches!(target.fundamental(), Type::OBJECT | Type::STRING | Type::POINTER) {
            return Ok(Value::for_type(target));
        }
        let value = Value::from_managed(value)?;
        let (actual, _) = value.value_type();
        if actual == target || actual.is_a(target) {
            Ok(value)
        } else {
            value.transform_to(target)
        }
    }

    /// Reads the value back into its managed form, dispatching on the
    /// fundamental type.
    pub fn to_managed(&self) -> Result<Dynamic> {
        unsafe { to_managed(self.as_ptr()) }
    }

    /// Typed read. Panics when the value does not hold a `T`.
    pub fn get<T: ValueType>(&self) -> T {
        self.expect_holds(T::static_type());
        unsafe { T::read(self.as_ptr()) }
    }

    /// Typed write. Panics when the value does not hold a `T`.
    pub fn set<T: ValueType>(&mut self, v: T) {
        self.expect_holds(T::static_type());
        unsafe { T::write(self.as_mut_ptr(), v) }
    }

    fn expect_holds(&self, expected: Type) {
        let (actual, fundamental) = self.value_type();
        if fundamental != expected.fundamental() {
            panic!("value of type {} cannot be accessed as {}", actual, expected);
        }
    }

    /// The held string; NULL is reported as `NullPointer` so it stays
    /// distinct from `""`.
    pub fn get_string(&self) -> Result<String> {
        self.expect_holds(Type::STRING);
        let s = unsafe { ffi::g_value_get_string(self.as_ptr()) };
        if s.is_null() {
            return Err(BridgeError::NullPointer);
        }
        Ok(unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned())
    }

    pub fn set_string(&mut self, s: &str) -> Result<()> {
        self.expect_holds(Type::STRING);
        let s = CString::new(s)?;
        unsafe { ffi::g_value_set_string(self.as_mut_ptr(), s.as_ptr()) };
        Ok(())
    }

    pub fn get_long(&self) -> c_long {
        self.expect_holds(Type::LONG);
        unsafe { ffi::g_value_get_long(self.as_ptr()) }
    }

    pub fn get_ulong(&self) -> c_ulong {
        self.expect_holds(Type::ULONG);
        unsafe { ffi::g_value_get_ulong(self.as_ptr()) }
    }

    /// Converts into a value of `target` through the native transform
    /// table. Identical or compatible types are copied.
    pub fn transform_to(&self, target: Type) -> Result<Value> {
        let (actual, _) = self.value_type();
        let (src, dest) = (actual.into_glib(), target.into_glib());
        let mut out = Value::for_type(target);
        unsafe {
            if ffi::g_value_type_compatible(src, dest) != ffi::GFALSE {
                ffi::g_value_copy(self.as_ptr(), out.as_mut_ptr());
                return Ok(out);
            }
            if ffi::g_value_type_transformable(src, dest) != ffi::GFALSE
                && ffi::g_value_transform(self.as_ptr(), out.as_mut_ptr()) != ffi::GFALSE
            {
                return Ok(out);
            }
        }
        Err(BridgeError::InvalidType { expected: target.name(), actual: actual.name() })
    }
}

/// # Safety
/// `value` must point to an initialized `GValue`.
pub(crate) unsafe fn to_managed(value: *const ffi::GValue) -> Result<Dynamic> {
    let actual = Type::from_glib((*value).g_type);
    let not_implemented = |what: &str| Err(BridgeError::ConversionNotImplemented(what.to_string()));

    let managed = match actual.fundamental() {
        Type::INVALID => panic!("tried to convert an uninitialized value"),
        Type::NONE => Dynamic::None,
        Type::INTERFACE => return not_implemented("interface"),
        Type::ENUM => return not_implemented("enum"),
        Type::FLAGS => return not_implemented("flags"),
        Type::BOXED => return not_implemented("boxed"),
        Type::PARAM => return not_implemented("param"),
        Type::VARIANT => return not_implemented("variant"),
        Type::CHAR => Dynamic::I8(i8::read(value)),
        Type::UCHAR => Dynamic::U8(u8::read(value)),
        Type::BOOL => Dynamic::Bool(bool::read(value)),
        Type::I32 => Dynamic::I32(i32::read(value)),
        Type::U32 => Dynamic::U32(u32::read(value)),
        Type::LONG => Dynamic::Long(ffi::g_value_get_long(value)),
        Type::ULONG => Dynamic::ULong(ffi::g_value_get_ulong(value)),
        Type::I64 => Dynamic::I64(i64::read(value)),
        Type::U64 => Dynamic::U64(u64::read(value)),
        Type::F32 => Dynamic::F32(f32::read(value)),
        Type::F64 => Dynamic::F64(f64::read(value)),
        Type::STRING => {
            let s = ffi::g_value_get_string(value);
            if s.is_null() {
                Dynamic::None
            } else {
                Dynamic::String(CStr::from_ptr(s).to_string_lossy().into_owned())
            }
        }
        Type::POINTER => Dynamic::Pointer(ffi::g_value_get_pointer(value)),
        Type::OBJECT => Dynamic::Object(Option::<Object>::read(value)),
        _ => {
            let chain: Vec<String> = actual.ancestors().map(|t| format!("({}) {}", t.into_glib(), t)).collect();
            log::warn!("type conversion not supported for unexpected type: {}", chain.join(" <- "));
            return not_implemented(actual.name().as_str());
        }
    };
    Ok(managed)
}

impl Clone for Value {
    fn clone(&self) -> Self {
        if !self.is_initialized() {
            return Value { inner: ffi::GValue::uninit() };
        }
        unsafe { Value::from_glib_borrow(self.as_ptr()) }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        if self.is_initialized() {
            unsafe { ffi::g_value_unset(&mut self.inner) };
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_initialized() {
            return f.write_str("Value(<uninitialized>)");
        }
        match self.to_managed() {
            Ok(managed) => write!(f, "Value({}: {:?})", self.value_type().0, managed),
            Err(_) => write!(f, "Value({})", self.value_type().0),
        }
    }
}

impl TryFrom<Dynamic> for Value {
    type Error = BridgeError;

    fn try_from(value: Dynamic) -> Result<Value> {
        Value::from_managed(&value)
    }
}
