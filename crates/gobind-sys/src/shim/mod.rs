//! In-process runtime implementing the subset of the GLib/GObject C ABI
//! that `gobind` calls.
//!
//! Every function here has the same name and signature as its native
//! counterpart, so the binding is written once against `gobind_sys::*`.
//! Bookkeeping lives in process-wide tables keyed by address; none of
//! those locks is held while user code (init functions, marshals,
//! notifiers, weak-ref callbacks) runs.

/// `g_return_if_fail` without the stack trace.
macro_rules! return_if_fail {
    ($cond:expr, $func:expr) => {
        return_if_fail!($cond, $func, ())
    };
    ($cond:expr, $func:expr, $ret:expr) => {
        if !$cond {
            log::error!("{}: assertion '{}' failed", $func, stringify!($cond));
            return $ret;
        }
    };
}
pub(crate) use return_if_fail;

mod closure;
mod main_loop;
mod object;
mod param;
mod signal;
mod types;
mod value;

pub use closure::*;
pub use main_loop::*;
pub use object::*;
pub use param::*;
pub use signal::*;
pub use types::*;
pub use value::*;

use std::alloc::{self, Layout};

const BLOCK_ALIGN: usize = 16;

/// Zeroed block for instances, classes and closures.
pub(crate) fn alloc_block(size: usize) -> *mut u8 {
    let layout = match Layout::from_size_align(size.max(1), BLOCK_ALIGN) {
        Ok(layout) => layout,
        Err(_) => {
            log::error!("shim: invalid block size {}", size);
            std::process::abort();
        }
    };
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        alloc::handle_alloc_error(layout);
    }
    ptr
}

/// # Safety
/// `ptr` must come from [`alloc_block`] with the same `size`.
pub(crate) unsafe fn free_block(ptr: *mut u8, size: usize) {
    if let Ok(layout) = Layout::from_size_align(size.max(1), BLOCK_ALIGN) {
        alloc::dealloc(ptr, layout);
    }
}

/// Opaque handles (sources, contexts, loops) only need a unique address.
pub(crate) fn alloc_handle() -> usize {
    Box::into_raw(Box::new(0u64)) as usize
}

/// # Safety
/// `handle` must come from [`alloc_handle`] and not have been freed.
pub(crate) unsafe fn free_handle(handle: usize) {
    drop(Box::from_raw(handle as *mut u64));
}
