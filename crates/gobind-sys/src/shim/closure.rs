use std::collections::HashMap;
use std::mem::size_of;
use std::os::raw::c_uint;
use std::ptr;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use super::{alloc_block, free_block, return_if_fail};
use crate::*;

type Notifier = (usize, GClosureNotify);

struct ClosureMeta {
    size: usize,
    ref_count: u32,
    floating: bool,
    invalid: bool,
    finalize_notifiers: Vec<Notifier>,
    invalidate_notifiers: Vec<Notifier>,
}

lazy_static! {
    static ref CLOSURES: Mutex<HashMap<usize, ClosureMeta>> = Mutex::new(HashMap::new());
}

fn is_live_closure(closure: *mut GClosure) -> bool {
    CLOSURES.lock().contains_key(&(closure as usize))
}

unsafe fn run_notifiers(notifiers: Vec<Notifier>, closure: *mut GClosure) {
    for (data, notify) in notifiers {
        if let Some(notify) = notify {
            notify(data as gpointer, closure);
        }
    }
}

pub unsafe extern "C" fn g_closure_new_simple(sizeof_closure: c_uint, data: gpointer) -> *mut GClosure {
    let size = (sizeof_closure as usize).max(size_of::<GClosure>());
    let closure = alloc_block(size) as *mut GClosure;
    (*closure).ref_count = 1;
    (*closure).data = data;

    CLOSURES.lock().insert(closure as usize, ClosureMeta {
        size,
        ref_count: 1,
        floating: true,
        invalid: false,
        finalize_notifiers: Vec::new(),
        invalidate_notifiers: Vec::new(),
    });
    closure
}

pub unsafe extern "C" fn g_closure_set_marshal(closure: *mut GClosure, marshal: GClosureMarshal) {
    return_if_fail!(is_live_closure(closure), "g_closure_set_marshal");
    (*closure).marshal = marshal;
}

pub unsafe extern "C" fn g_closure_ref(closure: *mut GClosure) -> *mut GClosure {
    let mut closures = CLOSURES.lock();
    match closures.get_mut(&(closure as usize)) {
        Some(meta) => {
            meta.ref_count += 1;
            (*closure).ref_count = meta.ref_count;
        }
        None => log::error!("g_closure_ref: assertion 'closure->ref_count > 0' failed"),
    }
    closure
}

pub unsafe extern "C" fn g_closure_sink(closure: *mut GClosure) {
    let was_floating = match CLOSURES.lock().get_mut(&(closure as usize)) {
        Some(meta) => std::mem::replace(&mut meta.floating, false),
        None => false,
    };
    if was_floating {
        g_closure_unref(closure);
    }
}

pub unsafe extern "C" fn g_closure_unref(closure: *mut GClosure) {
    let remaining = {
        let mut closures = CLOSURES.lock();
        let Some(meta) = closures.get_mut(&(closure as usize)) else {
            log::error!("g_closure_unref: assertion 'closure->ref_count > 0' failed");
            return;
        };
        if meta.ref_count == 1 && !meta.invalid {
            // Invalidate while the last reference is still held
            None
        } else {
            meta.ref_count -= 1;
            (*closure).ref_count = meta.ref_count;
            Some(meta.ref_count)
        }
    };

    match remaining {
        None => {
            g_closure_invalidate(closure);
            g_closure_unref(closure);
        }
        Some(0) => {
            let meta = CLOSURES.lock().remove(&(closure as usize));
            if let Some(meta) = meta {
                run_notifiers(meta.finalize_notifiers, closure);
                free_block(closure as *mut u8, meta.size);
            }
        }
        Some(_) => {}
    }
}

pub unsafe extern "C" fn g_closure_invalidate(closure: *mut GClosure) {
    let notifiers = {
        let mut closures = CLOSURES.lock();
        match closures.get_mut(&(closure as usize)) {
            Some(meta) if !meta.invalid => {
                meta.invalid = true;
                meta.ref_count += 1;
                std::mem::take(&mut meta.invalidate_notifiers)
            }
            _ => return,
        }
    };
    run_notifiers(notifiers, closure);
    g_closure_unref(closure);
}

pub unsafe extern "C" fn g_closure_invoke(
    closure: *mut GClosure,
    return_value: *mut GValue,
    n_param_values: c_uint,
    param_values: *const GValue,
    invocation_hint: gpointer,
) {
    let runnable = match CLOSURES.lock().get_mut(&(closure as usize)) {
        Some(meta) if !meta.invalid => {
            meta.ref_count += 1;
            true
        }
        Some(_) => false,
        None => {
            log::error!("g_closure_invoke: assertion 'closure != NULL' failed");
            return;
        }
    };
    if !runnable {
        return;
    }

    match (*closure).marshal {
        Some(marshal) => marshal(
            closure,
            return_value,
            n_param_values,
            param_values,
            invocation_hint,
            ptr::null_mut(),
        ),
        None => log::error!("g_closure_invoke: assertion 'closure->marshal' failed"),
    }
    g_closure_unref(closure);
}

pub unsafe extern "C" fn g_closure_add_finalize_notifier(
    closure: *mut GClosure,
    notify_data: gpointer,
    notify_func: GClosureNotify,
) {
    if let Some(meta) = CLOSURES.lock().get_mut(&(closure as usize)) {
        meta.finalize_notifiers.push((notify_data as usize, notify_func));
    }
}

pub unsafe extern "C" fn g_closure_add_invalidate_notifier(
    closure: *mut GClosure,
    notify_data: gpointer,
    notify_func: GClosureNotify,
) {
    if let Some(meta) = CLOSURES.lock().get_mut(&(closure as usize)) {
        if !meta.invalid {
            meta.invalidate_notifiers.push((notify_data as usize, notify_func));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static INVALIDATED: AtomicUsize = AtomicUsize::new(0);
    static FINALIZED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn count_calls(
        _closure: *mut GClosure,
        _return_value: *mut GValue,
        _n_param_values: c_uint,
        _param_values: *const GValue,
        _hint: gpointer,
        _marshal_data: gpointer,
    ) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn on_invalidate(_data: gpointer, _closure: *mut GClosure) {
        INVALIDATED.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn on_finalize(_data: gpointer, _closure: *mut GClosure) {
        FINALIZED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_closure_lifecycle() {
        unsafe {
            let closure = g_closure_new_simple(size_of::<GClosure>() as c_uint, ptr::null_mut());
            g_closure_set_marshal(closure, Some(count_calls));
            g_closure_add_invalidate_notifier(closure, ptr::null_mut(), Some(on_invalidate));
            g_closure_add_finalize_notifier(closure, ptr::null_mut(), Some(on_finalize));

            // Owner takes it over: floating ref goes away, count stays one
            g_closure_ref(closure);
            g_closure_sink(closure);

            g_closure_invoke(closure, ptr::null_mut(), 0, ptr::null(), ptr::null_mut());
            assert_eq!(CALLS.load(Ordering::SeqCst), 1);

            g_closure_invalidate(closure);
            g_closure_invalidate(closure);
            assert_eq!(INVALIDATED.load(Ordering::SeqCst), 1);

            // Invalid closures are never marshalled again
            g_closure_invoke(closure, ptr::null_mut(), 0, ptr::null(), ptr::null_mut());
            assert_eq!(CALLS.load(Ordering::SeqCst), 1);

            assert_eq!(FINALIZED.load(Ordering::SeqCst), 0);
            g_closure_unref(closure);
            assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
        }
    }
}
