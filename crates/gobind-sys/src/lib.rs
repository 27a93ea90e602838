//! Raw GLib/GObject ABI surface used by `gobind`.
//!
//! The type definitions mirror the C layouts exactly. The functions come
//! from one of two providers with identical signatures:
//!
//! * `system` feature: the real `libgobject-2.0` / `libglib-2.0`
//! * default: [`shim`], an in-process runtime that honours the same
//!   contract (type registry, floating references, values, properties,
//!   closures, signals, main contexts) so the binding runs without the toolkit
//!   installed.

#![allow(non_camel_case_types)]

use std::marker::{PhantomData, PhantomPinned};
use std::os::raw::{c_char, c_double, c_float, c_int, c_long, c_uint, c_ulong, c_void};

#[cfg(feature = "system")]
mod system;
#[cfg(feature = "system")]
pub use system::*;

#[cfg(not(feature = "system"))]
pub mod shim;
#[cfg(not(feature = "system"))]
pub use shim::*;

pub type gboolean = c_int;
pub type gpointer = *mut c_void;
pub type gconstpointer = *const c_void;
pub type GType = usize;
pub type GQuark = u32;

pub const GFALSE: gboolean = 0;
pub const GTRUE: gboolean = 1;

// Fundamental type ids
pub const G_TYPE_FUNDAMENTAL_SHIFT: usize = 2;
pub const G_TYPE_FUNDAMENTAL_MAX: GType = 255 << G_TYPE_FUNDAMENTAL_SHIFT;

pub const G_TYPE_INVALID: GType = 0 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_NONE: GType = 1 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_INTERFACE: GType = 2 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_CHAR: GType = 3 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_UCHAR: GType = 4 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_BOOLEAN: GType = 5 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_INT: GType = 6 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_UINT: GType = 7 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_LONG: GType = 8 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_ULONG: GType = 9 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_INT64: GType = 10 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_UINT64: GType = 11 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_ENUM: GType = 12 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_FLAGS: GType = 13 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_FLOAT: GType = 14 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_DOUBLE: GType = 15 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_STRING: GType = 16 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_POINTER: GType = 17 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_BOXED: GType = 18 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_PARAM: GType = 19 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_OBJECT: GType = 20 << G_TYPE_FUNDAMENTAL_SHIFT;
pub const G_TYPE_VARIANT: GType = 21 << G_TYPE_FUNDAMENTAL_SHIFT;

pub type GTypeFlags = c_uint;

pub type GSignalFlags = c_uint;
pub const G_SIGNAL_RUN_FIRST: GSignalFlags = 1 << 0;
pub const G_SIGNAL_RUN_LAST: GSignalFlags = 1 << 1;
pub const G_SIGNAL_RUN_CLEANUP: GSignalFlags = 1 << 2;
pub const G_SIGNAL_NO_RECURSE: GSignalFlags = 1 << 3;
pub const G_SIGNAL_DETAILED: GSignalFlags = 1 << 4;
pub const G_SIGNAL_ACTION: GSignalFlags = 1 << 5;
pub const G_SIGNAL_NO_HOOKS: GSignalFlags = 1 << 6;

pub const G_PRIORITY_DEFAULT: c_int = 0;
pub const G_PRIORITY_DEFAULT_IDLE: c_int = 200;

// GValue

#[repr(C)]
#[derive(Copy, Clone)]
pub union GValueData {
    pub v_int: c_int,
    pub v_uint: c_uint,
    pub v_long: c_long,
    pub v_ulong: c_ulong,
    pub v_int64: i64,
    pub v_uint64: u64,
    pub v_float: c_float,
    pub v_double: c_double,
    pub v_pointer: gpointer,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct GValue {
    pub g_type: GType,
    pub data: [GValueData; 2],
}

impl GValue {
    /// An all-zero value, the state `G_VALUE_INIT` produces.
    pub const fn uninit() -> Self {
        GValue {
            g_type: G_TYPE_INVALID,
            data: [GValueData { v_uint64: 0 }, GValueData { v_uint64: 0 }],
        }
    }
}

impl std::fmt::Debug for GValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GValue").field("g_type", &self.g_type).finish_non_exhaustive()
    }
}

// Type system

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GTypeClass {
    pub g_type: GType,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GTypeInstance {
    pub g_class: *mut GTypeClass,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GObject {
    pub g_type_instance: GTypeInstance,
    pub ref_count: c_uint,
    pub qdata: gpointer,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GObjectClass {
    pub g_type_class: GTypeClass,
    pub construct_properties: gpointer,
    pub constructor: gpointer,
    pub set_property: GObjectSetPropertyFunc,
    pub get_property: GObjectGetPropertyFunc,
    pub dispose: gpointer,
    pub finalize: gpointer,
    pub dispatch_properties_changed: gpointer,
    pub notify: gpointer,
    pub constructed: gpointer,
    pub flags: usize,
    pub n_construct_properties: usize,
    pub pspecs: gpointer,
    pub n_pspecs: usize,
    pub pdummy: [gpointer; 3],
}

pub type GObjectSetPropertyFunc = Option<
    unsafe extern "C" fn(object: *mut GObject, property_id: c_uint, value: *const GValue, pspec: *mut GParamSpec),
>;
pub type GObjectGetPropertyFunc = Option<
    unsafe extern "C" fn(object: *mut GObject, property_id: c_uint, value: *mut GValue, pspec: *mut GParamSpec),
>;

pub type GInitiallyUnowned = GObject;
pub type GInitiallyUnownedClass = GObjectClass;

pub type GClassInitFunc = Option<unsafe extern "C" fn(g_class: gpointer, class_data: gpointer)>;
pub type GInstanceInitFunc =
    Option<unsafe extern "C" fn(instance: *mut GTypeInstance, g_class: gpointer)>;
pub type GWeakNotify = Option<unsafe extern "C" fn(data: gpointer, where_the_object_was: *mut GObject)>;

// Properties

pub type GParamFlags = c_uint;
pub const G_PARAM_READABLE: GParamFlags = 1 << 0;
pub const G_PARAM_WRITABLE: GParamFlags = 1 << 1;
pub const G_PARAM_READWRITE: GParamFlags = G_PARAM_READABLE | G_PARAM_WRITABLE;

/// Public head of `GParamSpec`; the runtime owns the rest.
#[repr(C)]
#[derive(Debug)]
pub struct GParamSpec {
    pub g_type_instance: GTypeInstance,
    pub name: *const c_char,
    pub flags: GParamFlags,
    pub value_type: GType,
    pub owner_type: GType,
}

// Closures

/// `GClosure`. The first word packs the C bitfields (`ref_count:15`,
/// `floating:1`, `is_invalid:1`, ...); only the runtime reads it.
#[repr(C)]
#[derive(Debug)]
pub struct GClosure {
    pub ref_count: c_uint,
    pub marshal: GClosureMarshal,
    pub data: gpointer,
    pub notifiers: gpointer,
}

pub type GClosureMarshal = Option<
    unsafe extern "C" fn(
        closure: *mut GClosure,
        return_value: *mut GValue,
        n_param_values: c_uint,
        param_values: *const GValue,
        invocation_hint: gpointer,
        marshal_data: gpointer,
    ),
>;
pub type GClosureNotify = Option<unsafe extern "C" fn(data: gpointer, closure: *mut GClosure)>;

// Signals

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GSignalInvocationHint {
    pub signal_id: c_uint,
    pub detail: GQuark,
    pub run_type: GSignalFlags,
}

pub type GSignalAccumulator = Option<
    unsafe extern "C" fn(
        ihint: *mut GSignalInvocationHint,
        return_accu: *mut GValue,
        handler_return: *const GValue,
        data: gpointer,
    ) -> gboolean,
>;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GSignalQuery {
    pub signal_id: c_uint,
    pub signal_name: *const c_char,
    pub itype: GType,
    pub signal_flags: GSignalFlags,
    pub return_type: GType,
    pub n_params: c_uint,
    pub param_types: *const GType,
}

impl GSignalQuery {
    pub const fn empty() -> Self {
        GSignalQuery {
            signal_id: 0,
            signal_name: std::ptr::null(),
            itype: G_TYPE_INVALID,
            signal_flags: 0,
            return_type: G_TYPE_NONE,
            n_params: 0,
            param_types: std::ptr::null(),
        }
    }
}

// Main loop handles are opaque

#[repr(C)]
pub struct GSource {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

#[repr(C)]
pub struct GMainContext {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

#[repr(C)]
pub struct GMainLoop {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// `G_TYPE_FROM_INSTANCE`: the type lives in the first word of the class.
///
/// # Safety
/// `instance` must point to a live, classed type instance.
pub unsafe fn g_type_from_instance(instance: *const GTypeInstance) -> GType {
    (*(*instance).g_class).g_type
}
