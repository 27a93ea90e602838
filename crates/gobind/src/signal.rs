use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::fmt;
use std::ops::BitOr;
use std::os::raw::{c_uint, c_ulong};
use std::ptr;
use std::slice;

use gobind_sys as ffi;
use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::closure::{Closure, Handler};
use crate::errors::{BridgeError, Result};
use crate::object::Object;
use crate::types::Type;
use crate::value::{Dynamic, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalHandlerId(c_ulong);

impl SignalHandlerId {
    pub fn as_raw(self) -> c_ulong {
        self.0
    }
}

impl fmt::Display for SignalHandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalFlags(ffi::GSignalFlags);

impl SignalFlags {
    pub const RUN_FIRST: SignalFlags = SignalFlags(ffi::G_SIGNAL_RUN_FIRST);
    pub const RUN_LAST: SignalFlags = SignalFlags(ffi::G_SIGNAL_RUN_LAST);
    pub const RUN_CLEANUP: SignalFlags = SignalFlags(ffi::G_SIGNAL_RUN_CLEANUP);
    pub const NO_RECURSE: SignalFlags = SignalFlags(ffi::G_SIGNAL_NO_RECURSE);
    pub const DETAILED: SignalFlags = SignalFlags(ffi::G_SIGNAL_DETAILED);
    pub const ACTION: SignalFlags = SignalFlags(ffi::G_SIGNAL_ACTION);
    pub const NO_HOOKS: SignalFlags = SignalFlags(ffi::G_SIGNAL_NO_HOOKS);

    pub fn bits(self) -> ffi::GSignalFlags {
        self.0
    }

    pub fn contains(self, other: SignalFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SignalFlags {
    type Output = SignalFlags;

    fn bitor(self, rhs: SignalFlags) -> SignalFlags {
        SignalFlags(self.0 | rhs.0)
    }
}

/// What the native signal registry knows about one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    pub id: u32,
    pub name: String,
    pub itype: Type,
    pub flags: SignalFlags,
    pub return_type: Type,
    pub param_types: Vec<Type>,
}

lazy_static! {
    /// Handler id -> closure address, so a disconnect can invalidate the
    /// closure it attached.
    static ref HANDLERS: RwLock<HashMap<c_ulong, usize>> = RwLock::new(HashMap::new());
}

unsafe extern "C" fn forget_handler(data: ffi::gpointer, _closure: *mut ffi::GClosure) {
    let id = data as usize as c_ulong;
    if HANDLERS.write().remove(&id).is_some() {
        log::trace!("handler {} went away with its closure", id);
    }
}

/// Closure attached by a live handler that was connected through this
/// module, or `None` once the handler is gone.
pub fn handler_closure(handler: SignalHandlerId) -> Option<*mut ffi::GClosure> {
    HANDLERS.read().get(&handler.0).map(|addr| *addr as *mut ffi::GClosure)
}

/// Registers a new signal on `itype`. Handlers are the only behaviour;
/// there is no class handler.
pub fn new_signal(
    name: &str,
    itype: Type,
    flags: SignalFlags,
    return_type: Type,
    param_types: &[Type],
) -> Result<u32> {
    let c_name = CString::new(name)?;
    let mut params: Vec<ffi::GType> = param_types.iter().map(|t| t.into_glib()).collect();
    let id = unsafe {
        ffi::g_signal_newv(
            c_name.as_ptr(),
            itype.into_glib(),
            flags.bits(),
            ptr::null_mut(),
            None,
            ptr::null_mut(),
            None,
            return_type.into_glib(),
            params.len() as c_uint,
            if params.is_empty() { ptr::null_mut() } else { params.as_mut_ptr() },
        )
    };
    if id == 0 {
        return Err(BridgeError::UnknownSignal { signal: name.to_string(), type_name: itype.name() });
    }
    log::debug!("registered signal {}::{} (id {})", itype, name, id);
    Ok(id)
}

/// Looks a signal up on `itype` and its ancestors.
pub fn query(itype: Type, name: &str) -> Result<SignalInfo> {
    let unknown = || BridgeError::UnknownSignal { signal: name.to_string(), type_name: itype.name() };
    let c_name = CString::new(name)?;
    let id = unsafe { ffi::g_signal_lookup(c_name.as_ptr(), itype.into_glib()) };
    if id == 0 {
        return Err(unknown());
    }

    let mut raw = ffi::GSignalQuery::empty();
    unsafe { ffi::g_signal_query(id, &mut raw) };
    if raw.signal_id == 0 {
        return Err(unknown());
    }
    let param_types = if raw.n_params == 0 || raw.param_types.is_null() {
        Vec::new()
    } else {
        unsafe { slice::from_raw_parts(raw.param_types, raw.n_params as usize) }
            .iter()
            .map(|t| Type::from_glib(*t))
            .collect()
    };
    let name = if raw.signal_name.is_null() {
        name.to_string()
    } else {
        unsafe { CStr::from_ptr(raw.signal_name) }.to_string_lossy().into_owned()
    };

    Ok(SignalInfo {
        id: raw.signal_id,
        name,
        itype: Type::from_glib(raw.itype),
        flags: SignalFlags(raw.signal_flags),
        return_type: Type::from_glib(raw.return_type),
        param_types,
    })
}

impl Object {
    /// Connects `handler` to the signal named `signal`.
    pub fn connect<F, Args>(&self, signal: &str, handler: F) -> Result<SignalHandlerId>
    where
        F: Handler<Args>,
        Args: 'static,
    {
        self.connect_closure(signal, &Closure::new(handler), false)
    }

    /// Like [`Object::connect`], but runs after the default handlers.
    pub fn connect_after<F, Args>(&self, signal: &str, handler: F) -> Result<SignalHandlerId>
    where
        F: Handler<Args>,
        Args: 'static,
    {
        self.connect_closure(signal, &Closure::new(handler), true)
    }

    pub fn connect_closure(&self, signal: &str, closure: &Closure, after: bool) -> Result<SignalHandlerId> {
        // Checked first so an unknown name is an error, not a native warning
        query(self.type_(), signal)?;
        let c_name = CString::new(signal)?;
        let id = unsafe {
            ffi::g_signal_connect_closure(
                self.as_ptr() as ffi::gpointer,
                c_name.as_ptr(),
                closure.as_ptr(),
                after as ffi::gboolean,
            )
        };
        if id == 0 {
            return Err(BridgeError::UnknownSignal { signal: signal.to_string(), type_name: self.type_name() });
        }

        HANDLERS.write().insert(id, closure.as_ptr() as usize);
        // Finalizing the instance or invalidating the closure elsewhere
        // disconnects natively without passing through handler_disconnect
        unsafe {
            ffi::g_closure_add_invalidate_notifier(closure.as_ptr(), id as usize as ffi::gpointer, Some(forget_handler));
        }
        log::debug!("connected handler {} to {}::{} (closure {:p})", id, self.type_name(), signal, closure.as_ptr());
        Ok(SignalHandlerId(id))
    }

    /// Disconnects the handler, invalidates its closure and drops the
    /// callable from the closure registry.
    pub fn handler_disconnect(&self, handler: SignalHandlerId) {
        let closure = HANDLERS.write().remove(&handler.0).map(|addr| addr as *mut ffi::GClosure);
        let instance = self.as_ptr() as ffi::gpointer;

        // A handler whose closure was invalidated elsewhere is already gone,
        // and so may be the closure
        if unsafe { ffi::g_signal_handler_is_connected(instance, handler.0) } == ffi::GFALSE {
            log::debug!("handler {} on {} was already disconnected", handler, self.type_name());
            return;
        }

        unsafe {
            match closure {
                Some(closure) => {
                    ffi::g_closure_ref(closure);
                    ffi::g_signal_handler_disconnect(instance, handler.0);
                    ffi::g_closure_invalidate(closure);
                    ffi::g_closure_unref(closure);
                }
                None => ffi::g_signal_handler_disconnect(instance, handler.0),
            }
        }
        log::debug!("disconnected handler {} from {}", handler, self.type_name());
    }

    pub fn handler_block(&self, handler: SignalHandlerId) {
        unsafe { ffi::g_signal_handler_block(self.as_ptr() as ffi::gpointer, handler.0) }
    }

    pub fn handler_unblock(&self, handler: SignalHandlerId) {
        unsafe { ffi::g_signal_handler_unblock(self.as_ptr() as ffi::gpointer, handler.0) }
    }

    pub fn handler_is_connected(&self, handler: SignalHandlerId) -> bool {
        unsafe { ffi::g_signal_handler_is_connected(self.as_ptr() as ffi::gpointer, handler.0) != ffi::GFALSE }
    }

    /// Ends the emission of `signal` currently running on this object.
    pub fn stop_emission(&self, signal: &str) -> Result<()> {
        query(self.type_(), signal)?;
        let c_name = CString::new(signal)?;
        unsafe { ffi::g_signal_stop_emission_by_name(self.as_ptr() as ffi::gpointer, c_name.as_ptr()) };
        Ok(())
    }

    /// Emits `signal` synchronously with `args` and returns what the
    /// handlers left in the return slot (`Dynamic::None` for signals
    /// without a return type).
    pub fn emit(&self, signal: &str, args: &[Dynamic]) -> Result<Dynamic> {
        let info = query(self.type_(), signal)?;
        if args.len() != info.param_types.len() {
            return Err(BridgeError::ArgumentCount {
                signal: signal.to_string(),
                expected: info.param_types.len(),
                given: args.len(),
            });
        }

        let mut values = Vec::with_capacity(args.len() + 1);
        let mut instance = Value::for_type(self.type_());
        instance.set(Some(self.clone()));
        values.push(instance);
        for (index, (arg, param_type)) in args.iter().zip(&info.param_types).enumerate() {
            let value = Value::from_managed_as(arg, *param_type)
                .map_err(|source| BridgeError::Argument { index, source: Box::new(source) })?;
            values.push(value);
        }

        let mut ret = (info.return_type != Type::NONE).then(|| Value::for_type(info.return_type));
        let ret_ptr = ret.as_mut().map_or(ptr::null_mut(), |v| v.as_mut_ptr());
        // Value is a transparent wrapper, so the Vec is a GValue array
        unsafe { ffi::g_signal_emitv(values.as_ptr() as *const ffi::GValue, info.id, 0, ret_ptr) };

        match ret {
            Some(ret) => ret.to_managed(),
            None => Ok(Dynamic::None),
        }
    }
}
