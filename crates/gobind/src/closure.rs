//! Native closures backed by Rust callables.
//!
//! Every closure created here is recorded in a process-wide registry keyed
//! by the closure's address. The native signal system only ever sees
//! [`marshal_trampoline`], which looks the callable up again on each
//! invocation. Entries leave the registry when the closure is invalidated
//! or finalized.

use std::collections::HashMap;
use std::mem::size_of;
use std::os::raw::c_uint;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::Arc;

use gobind_sys as ffi;
use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::config;
use crate::types::Type;
use crate::value::{self, Dynamic, FromDynamic, Value};

type Callback = Box<dyn Fn(Vec<Dynamic>) -> Option<Dynamic> + Send + Sync>;

struct Entry {
    arity: usize,
    call: Callback,
}

lazy_static! {
    /// Closure address -> callable. Lookups take the lock in recursive read
    /// mode, so a handler that emits a nested signal never waits behind a
    /// queued writer.
    static ref CLOSURES: RwLock<HashMap<usize, Arc<Entry>>> = RwLock::new(HashMap::new());
}

fn register(closure: *mut ffi::GClosure, entry: Entry) {
    log::debug!("registering closure {:p} (arity {})", closure, entry.arity);
    CLOSURES.write().insert(closure as usize, Arc::new(entry));
}

fn unregister(closure: *mut ffi::GClosure) {
    // The callable drops after the lock is released
    let removed = CLOSURES.write().remove(&(closure as usize));
    if removed.is_some() {
        log::debug!("unregistered closure {:p}", closure);
    }
}

fn lookup(closure: *mut ffi::GClosure) -> Option<Arc<Entry>> {
    CLOSURES.read_recursive().get(&(closure as usize)).cloned()
}

pub fn is_registered(closure: *mut ffi::GClosure) -> bool {
    CLOSURES.read_recursive().contains_key(&(closure as usize))
}

/// Number of live registrations, for leak diagnostics.
pub fn registered_count() -> usize {
    CLOSURES.read_recursive().len()
}

/// Values a handler may hand back to the native return slot.
pub trait HandlerReturn {
    fn into_return(self) -> Option<Dynamic>;
}

impl HandlerReturn for () {
    fn into_return(self) -> Option<Dynamic> {
        None
    }
}

impl HandlerReturn for Dynamic {
    fn into_return(self) -> Option<Dynamic> {
        match self {
            Dynamic::None => None,
            other => Some(other),
        }
    }
}

macro_rules! handler_return {
    ($($ty:ty),*) => {
        $(
            impl HandlerReturn for $ty {
                fn into_return(self) -> Option<Dynamic> {
                    Some(Dynamic::from(self))
                }
            }
        )*
    };
}

handler_return!(bool, i8, u8, i32, u32, i64, u64, f32, f64, String, &str, crate::Object, Option<crate::Object>);

/// A Rust callable that can be attached to a native closure. `Args` is the
/// tuple of parameter types; its length is the handler's arity.
pub trait Handler<Args>: Send + Sync + 'static {
    const ARITY: usize;

    fn call(&self, args: Vec<Dynamic>) -> Option<Dynamic>;
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> Handler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: HandlerReturn,
            $($arg: FromDynamic,)*
        {
            const ARITY: usize = <[&str]>::len(&[$(stringify!($arg)),*]);

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, args: Vec<Dynamic>) -> Option<Dynamic> {
                let mut args = args.into_iter();
                $(let $arg = <$arg as FromDynamic>::from_dynamic(args.next().unwrap_or(Dynamic::None));)*
                (self)($($arg),*).into_return()
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);

/// An owned reference to a registered native closure.
pub struct Closure {
    ptr: NonNull<ffi::GClosure>,
}

unsafe impl Send for Closure {}
unsafe impl Sync for Closure {}

impl Closure {
    pub fn new<F, Args>(f: F) -> Closure
    where
        F: Handler<Args>,
        Args: 'static,
    {
        let arity = <F as Handler<Args>>::ARITY;
        Closure::from_callback(arity, Box::new(move |args| Handler::call(&f, args)))
    }

    fn from_callback(arity: usize, call: Callback) -> Closure {
        unsafe {
            let raw = ffi::g_closure_new_simple(size_of::<ffi::GClosure>() as c_uint, ptr::null_mut());
            let Some(ptr) = NonNull::new(raw) else {
                log::error!("g_closure_new_simple returned NULL");
                process::abort();
            };
            ffi::g_closure_set_marshal(raw, Some(marshal_trampoline));
            register(raw, Entry { arity, call });
            ffi::g_closure_add_invalidate_notifier(raw, ptr::null_mut(), Some(unregister_notify));
            ffi::g_closure_add_finalize_notifier(raw, ptr::null_mut(), Some(unregister_notify));

            // Own the initial reference instead of leaving it floating
            ffi::g_closure_ref(raw);
            ffi::g_closure_sink(raw);
            Closure { ptr }
        }
    }

    pub fn as_ptr(&self) -> *mut ffi::GClosure {
        self.ptr.as_ptr()
    }

    pub fn arity(&self) -> Option<usize> {
        lookup(self.as_ptr()).map(|entry| entry.arity)
    }

    pub fn is_registered(&self) -> bool {
        is_registered(self.as_ptr())
    }

    /// Stops the native side from invoking this closure again. Connected
    /// handlers using it are disconnected.
    pub fn invalidate(&self) {
        unsafe { ffi::g_closure_invalidate(self.as_ptr()) }
    }

    /// Runs the callable directly the way the native marshal would, with
    /// `params` as the parameter array. Panics propagate to the caller.
    pub fn dispatch(&self, return_value: Option<&mut Value>, params: &[Value]) {
        let ret = return_value.map_or(ptr::null_mut(), |v| v.as_mut_ptr());
        // Value is a transparent wrapper around GValue
        let params = unsafe { slice::from_raw_parts(params.as_ptr() as *const ffi::GValue, params.len()) };
        unsafe { dispatch(self.as_ptr(), ret, params) }
    }
}

impl Clone for Closure {
    fn clone(&self) -> Self {
        unsafe { ffi::g_closure_ref(self.as_ptr()) };
        Closure { ptr: self.ptr }
    }
}

impl Drop for Closure {
    fn drop(&mut self) {
        unsafe { ffi::g_closure_unref(self.as_ptr()) }
    }
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("ptr", &self.ptr)
            .field("registered", &self.is_registered())
            .finish()
    }
}

unsafe extern "C" fn unregister_notify(_data: ffi::gpointer, closure: *mut ffi::GClosure) {
    unregister(closure);
}

/// The marshal installed on every closure. Unwinding out of an
/// `extern "C"` frame is not allowed, so a panicking handler aborts.
unsafe extern "C" fn marshal_trampoline(
    closure: *mut ffi::GClosure,
    return_value: *mut ffi::GValue,
    n_param_values: c_uint,
    param_values: *const ffi::GValue,
    _invocation_hint: ffi::gpointer,
    _marshal_data: ffi::gpointer,
) {
    let params = if n_param_values == 0 || param_values.is_null() {
        &[][..]
    } else {
        slice::from_raw_parts(param_values, n_param_values as usize)
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(closure, return_value, params)));
    if let Err(payload) = outcome {
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("non-string panic payload");
        log::error!("handler for closure {:p} panicked: {}", closure, message);
        process::abort();
    }
}

/// # Safety
/// Every element of `params` must be an initialized `GValue`, and
/// `return_value` must be NULL or point to a `GValue` that is either
/// zeroed or initialized.
unsafe fn dispatch(closure: *mut ffi::GClosure, return_value: *mut ffi::GValue, params: &[ffi::GValue]) {
    let Some(entry) = lookup(closure) else {
        panic!("no callable registered for closure {:p}", closure);
    };

    let (k, n) = (entry.arity, params.len());
    if config::trace_dispatch() {
        log::trace!("dispatching closure {:p}: arity {}, {} parameters", closure, k, n);
    }
    if k > n {
        panic!(
            "not enough arguments for closure {:p}: handler expects {}, but only {} were provided",
            closure, k, n
        );
    }

    // A zero-arity handler ignores whatever the emission carries
    let args = params[..k]
        .iter()
        .enumerate()
        .map(|(i, param)| {
            value::to_managed(param).unwrap_or_else(|err| panic!("cannot convert argument {}: {}", i, err))
        })
        .collect();

    let result = (entry.call)(args);
    if let Some(result) = result {
        if !return_value.is_null() {
            write_return(return_value, &result);
        }
    }
}

/// Stores a handler's result into the native return slot, initializing
/// an empty slot or converting to the type the slot already holds.
unsafe fn write_return(slot: *mut ffi::GValue, result: &Dynamic) {
    let value = Value::from_managed(result)
        .unwrap_or_else(|err| panic!("cannot convert handler result {}: {}", result.kind(), err));

    if (*slot).g_type == ffi::G_TYPE_INVALID {
        *slot = value.into_raw();
        return;
    }
    let target = Type::from_glib((*slot).g_type);
    let converted = value
        .transform_to(target)
        .unwrap_or_else(|err| panic!("cannot store handler result in a {} slot: {}", target, err));
    ffi::g_value_unset(slot);
    *slot = converted.into_raw();
}
