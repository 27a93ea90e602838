use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_uint, c_ulong};
use std::ptr;
use std::slice;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use super::object::{instance_type, is_live_instance};
use super::return_if_fail;
use super::types::{type_is_a, type_name_lossy};
use crate::*;

struct SignalNode {
    id: c_uint,
    name: CString,
    itype: GType,
    flags: GSignalFlags,
    class_closure: Option<usize>,
    return_type: GType,
    param_types: Vec<GType>,
}

struct HandlerRec {
    id: c_ulong,
    instance: usize,
    signal_id: c_uint,
    closure: usize,
    after: bool,
    block_count: u32,
}

struct SignalRegistry {
    signals: Vec<SignalNode>,
    handlers: Vec<HandlerRec>,
    next_handler: c_ulong,
}

lazy_static! {
    static ref SIGNALS: Mutex<SignalRegistry> = Mutex::new(SignalRegistry {
        signals: Vec::new(),
        handlers: Vec::new(),
        next_handler: 1,
    });
}

/// One entry per emission in progress on this thread.
struct Emission {
    instance: usize,
    signal_id: c_uint,
    stopped: bool,
}

thread_local! {
    static EMISSIONS: RefCell<Vec<Emission>> = const { RefCell::new(Vec::new()) };
}

/// Signal names treat `-` and `_` alike; a `::detail` suffix is accepted
/// and ignored since details are not modelled.
unsafe fn canonical_name(name: *const c_char) -> Option<String> {
    if name.is_null() {
        return None;
    }
    let name = CStr::from_ptr(name).to_str().ok()?;
    let name = name.split("::").next().unwrap_or(name);
    Some(name.replace('_', "-"))
}

impl SignalRegistry {
    fn lookup(&self, name: &str, itype: GType) -> c_uint {
        self.signals
            .iter()
            .find(|node| node.name.as_bytes() == name.as_bytes() && type_is_a(itype, node.itype))
            .map_or(0, |node| node.id)
    }

    fn node(&self, signal_id: c_uint) -> Option<&SignalNode> {
        self.signals.iter().find(|node| node.id == signal_id)
    }

    fn take_handler(&mut self, instance: usize, handler_id: c_ulong) -> Option<HandlerRec> {
        let pos = self
            .handlers
            .iter()
            .position(|h| h.id == handler_id && h.instance == instance)?;
        Some(self.handlers.remove(pos))
    }
}

pub unsafe extern "C" fn g_signal_newv(
    signal_name: *const c_char,
    itype: GType,
    signal_flags: GSignalFlags,
    class_closure: *mut GClosure,
    _accumulator: GSignalAccumulator,
    _accu_data: gpointer,
    _c_marshaller: GClosureMarshal,
    return_type: GType,
    n_params: c_uint,
    param_types: *mut GType,
) -> c_uint {
    let Some(name) = canonical_name(signal_name) else {
        log::error!("g_signal_newv: assertion 'signal_name != NULL' failed");
        return 0;
    };
    return_if_fail!(type_is_a(itype, G_TYPE_OBJECT), "g_signal_newv", 0);
    let Ok(c_name) = CString::new(name.clone()) else {
        return 0;
    };
    let params = if n_params == 0 || param_types.is_null() {
        Vec::new()
    } else {
        slice::from_raw_parts(param_types, n_params as usize).to_vec()
    };

    let id = {
        let mut registry = SIGNALS.lock();
        if registry.signals.iter().any(|node| node.name == c_name && node.itype == itype) {
            log::error!(
                "g_signal_newv: signal \"{}\" already exists in the '{}' class ancestry",
                name,
                type_name_lossy(itype)
            );
            return 0;
        }
        let id = registry.signals.len() as c_uint + 1;
        registry.signals.push(SignalNode {
            id,
            name: c_name,
            itype,
            flags: signal_flags,
            class_closure: (!class_closure.is_null()).then_some(class_closure as usize),
            return_type,
            param_types: params,
        });
        id
    };

    if !class_closure.is_null() {
        g_closure_ref(class_closure);
        g_closure_sink(class_closure);
    }
    id
}

pub unsafe extern "C" fn g_signal_lookup(name: *const c_char, itype: GType) -> c_uint {
    match canonical_name(name) {
        Some(name) => SIGNALS.lock().lookup(&name, itype),
        None => 0,
    }
}

pub unsafe extern "C" fn g_signal_query(signal_id: c_uint, query: *mut GSignalQuery) {
    return_if_fail!(!query.is_null(), "g_signal_query");
    let registry = SIGNALS.lock();
    *query = match registry.node(signal_id) {
        // Name and params live as long as the registry, which is forever
        Some(node) => GSignalQuery {
            signal_id: node.id,
            signal_name: node.name.as_ptr(),
            itype: node.itype,
            signal_flags: node.flags,
            return_type: node.return_type,
            n_params: node.param_types.len() as c_uint,
            param_types: node.param_types.as_ptr(),
        },
        None => GSignalQuery::empty(),
    };
}

unsafe extern "C" fn invalid_closure_notify(data: gpointer, closure: *mut GClosure) {
    let handler_id = data as usize as c_ulong;
    let removed = {
        let mut registry = SIGNALS.lock();
        match registry.handlers.iter().position(|h| h.id == handler_id) {
            Some(pos) => Some(registry.handlers.remove(pos)),
            None => None,
        }
    };
    if removed.is_some() {
        g_closure_unref(closure);
    }
}

pub unsafe extern "C" fn g_signal_connect_closure(
    instance: gpointer,
    detailed_signal: *const c_char,
    closure: *mut GClosure,
    after: gboolean,
) -> c_ulong {
    return_if_fail!(is_live_instance(instance), "g_signal_connect_closure", 0);
    return_if_fail!(!closure.is_null(), "g_signal_connect_closure", 0);
    let Some(name) = canonical_name(detailed_signal) else {
        return 0;
    };
    let itype = instance_type(instance);

    let handler_id = {
        let mut registry = SIGNALS.lock();
        let signal_id = registry.lookup(&name, itype);
        if signal_id == 0 {
            log::warn!(
                "g_signal_connect_closure: signal '{}' is invalid for instance '{:p}' of type '{}'",
                name,
                instance,
                type_name_lossy(itype)
            );
            return 0;
        }
        let id = registry.next_handler;
        registry.next_handler += 1;
        registry.handlers.push(HandlerRec {
            id,
            instance: instance as usize,
            signal_id,
            closure: closure as usize,
            after: after != GFALSE,
            block_count: 0,
        });
        id
    };

    g_closure_ref(closure);
    g_closure_sink(closure);
    g_closure_add_invalidate_notifier(closure, handler_id as usize as gpointer, Some(invalid_closure_notify));
    handler_id
}

pub unsafe extern "C" fn g_signal_handler_disconnect(instance: gpointer, handler_id: c_ulong) {
    let removed = SIGNALS.lock().take_handler(instance as usize, handler_id);
    match removed {
        Some(handler) => g_closure_unref(handler.closure as *mut GClosure),
        None => log::warn!(
            "g_signal_handler_disconnect: instance '{:p}' has no handler with id '{}'",
            instance,
            handler_id
        ),
    }
}

fn with_handler(instance: gpointer, handler_id: c_ulong, func: &str, f: impl FnOnce(&mut HandlerRec)) {
    let mut registry = SIGNALS.lock();
    match registry
        .handlers
        .iter_mut()
        .find(|h| h.id == handler_id && h.instance == instance as usize)
    {
        Some(handler) => f(handler),
        None => log::warn!("{}: instance '{:p}' has no handler with id '{}'", func, instance, handler_id),
    }
}

pub unsafe extern "C" fn g_signal_handler_block(instance: gpointer, handler_id: c_ulong) {
    with_handler(instance, handler_id, "g_signal_handler_block", |h| h.block_count += 1);
}

pub unsafe extern "C" fn g_signal_handler_unblock(instance: gpointer, handler_id: c_ulong) {
    with_handler(instance, handler_id, "g_signal_handler_unblock", |h| {
        if h.block_count == 0 {
            log::warn!("g_signal_handler_unblock: handler '{}' of instance '{:p}' is not blocked", h.id, h.instance as gpointer);
        } else {
            h.block_count -= 1;
        }
    });
}

pub unsafe extern "C" fn g_signal_handler_is_connected(instance: gpointer, handler_id: c_ulong) -> gboolean {
    let registry = SIGNALS.lock();
    registry
        .handlers
        .iter()
        .any(|h| h.id == handler_id && h.instance == instance as usize) as gboolean
}

fn emission_stopped() -> bool {
    EMISSIONS.with(|stack| stack.borrow().last().is_some_and(|e| e.stopped))
}

/// A step of an emission: either the class closure or a connected handler.
enum Step {
    Class(usize),
    Handler(c_ulong, usize),
}

pub unsafe extern "C" fn g_signal_emitv(
    instance_and_params: *const GValue,
    signal_id: c_uint,
    detail: GQuark,
    return_value: *mut GValue,
) {
    return_if_fail!(!instance_and_params.is_null(), "g_signal_emitv");
    let instance = (*instance_and_params).data[0].v_pointer;
    return_if_fail!(is_live_instance(instance), "g_signal_emitv");

    let (steps, n_values) = {
        let registry = SIGNALS.lock();
        let Some(node) = registry.node(signal_id) else {
            log::error!("g_signal_emitv: signal id '{}' is invalid for instance '{:p}'", signal_id, instance);
            return;
        };
        if !type_is_a(instance_type(instance), node.itype) {
            log::error!("g_signal_emitv: signal id '{}' is invalid for instance '{:p}'", signal_id, instance);
            return;
        }

        let mine = |after: bool| {
            registry
                .handlers
                .iter()
                .filter(move |h| h.instance == instance as usize && h.signal_id == signal_id && h.after == after)
                .map(|h| Step::Handler(h.id, h.closure))
        };
        let class = node.class_closure.map(Step::Class);
        let mut steps = Vec::new();
        if node.flags & G_SIGNAL_RUN_FIRST != 0 {
            steps.extend(class);
            steps.extend(mine(false));
        } else {
            steps.extend(mine(false));
            steps.extend(class);
        }
        steps.extend(mine(true));
        (steps, node.param_types.len() as c_uint + 1)
    };

    // Keep every closure alive for the whole emission
    for step in &steps {
        let (Step::Class(c) | Step::Handler(_, c)) = step;
        g_closure_ref(*c as *mut GClosure);
    }

    EMISSIONS.with(|stack| {
        stack.borrow_mut().push(Emission { instance: instance as usize, signal_id, stopped: false })
    });
    let mut hint = GSignalInvocationHint { signal_id, detail, run_type: G_SIGNAL_RUN_FIRST };

    for step in &steps {
        if emission_stopped() {
            break;
        }
        let closure = match *step {
            Step::Class(closure) => closure,
            Step::Handler(id, closure) => {
                let runnable = SIGNALS
                    .lock()
                    .handlers
                    .iter()
                    .any(|h| h.id == id && h.block_count == 0);
                if !runnable {
                    continue;
                }
                closure
            }
        };
        g_closure_invoke(
            closure as *mut GClosure,
            return_value,
            n_values,
            instance_and_params,
            ptr::addr_of_mut!(hint) as gpointer,
        );
    }

    EMISSIONS.with(|stack| stack.borrow_mut().pop());
    for step in steps {
        let (Step::Class(c) | Step::Handler(_, c)) = step;
        g_closure_unref(c as *mut GClosure);
    }
}

pub unsafe extern "C" fn g_signal_stop_emission_by_name(instance: gpointer, detailed_signal: *const c_char) {
    return_if_fail!(is_live_instance(instance), "g_signal_stop_emission_by_name");
    let Some(name) = canonical_name(detailed_signal) else {
        return;
    };
    let signal_id = SIGNALS.lock().lookup(&name, instance_type(instance));
    if signal_id == 0 {
        log::warn!("g_signal_stop_emission_by_name: signal '{}' is invalid for instance '{:p}'", name, instance);
        return;
    }

    let found = EMISSIONS.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack
            .iter_mut()
            .rev()
            .find(|e| e.instance == instance as usize && e.signal_id == signal_id)
        {
            Some(emission) => {
                emission.stopped = true;
                true
            }
            None => false,
        }
    });
    if !found {
        log::warn!(
            "g_signal_stop_emission_by_name: no emission of signal \"{}\" to stop for instance '{:p}'",
            name,
            instance
        );
    }
}

/// Drops every handler of a finalizing instance.
pub(crate) fn disconnect_all(instance: gpointer) {
    let removed: Vec<HandlerRec> = {
        let mut registry = SIGNALS.lock();
        let (gone, kept) = std::mem::take(&mut registry.handlers)
            .into_iter()
            .partition(|h| h.instance == instance as usize);
        registry.handlers = kept;
        gone
    };
    for handler in removed {
        let closure = handler.closure as *mut GClosure;
        unsafe {
            g_closure_invalidate(closure);
            g_closure_unref(closure);
        }
    }
}
