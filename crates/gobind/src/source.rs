//! Main contexts, main loops and callback sources.
//!
//! A source callback runs on whichever thread iterates the context it was
//! attached to. Returning `false` removes the source; its closure is then
//! finalized, which also drops the callable from the closure registry.

use std::fmt;
use std::ptr::{self, NonNull};

use gobind_sys as ffi;

use crate::closure::Closure;
use crate::errors::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

impl SourceId {
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct MainContext {
    ptr: NonNull<ffi::GMainContext>,
}

unsafe impl Send for MainContext {}
unsafe impl Sync for MainContext {}

impl MainContext {
    pub fn new() -> Result<MainContext> {
        let ptr = unsafe { ffi::g_main_context_new() };
        NonNull::new(ptr).map(|ptr| MainContext { ptr }).ok_or(BridgeError::NullPointer)
    }

    /// The global default context.
    pub fn default() -> Result<MainContext> {
        let ptr = unsafe { ffi::g_main_context_default() };
        let ptr = NonNull::new(ptr).ok_or(BridgeError::NullPointer)?;
        unsafe { ffi::g_main_context_ref(ptr.as_ptr()) };
        Ok(MainContext { ptr })
    }

    /// Borrowed pointer: takes a new reference.
    ///
    /// # Safety
    /// `ptr` must be NULL or point to a live context.
    pub unsafe fn from_glib_none(ptr: *mut ffi::GMainContext) -> Option<MainContext> {
        let ptr = NonNull::new(ptr)?;
        ffi::g_main_context_ref(ptr.as_ptr());
        Some(MainContext { ptr })
    }

    pub fn as_ptr(&self) -> *mut ffi::GMainContext {
        self.ptr.as_ptr()
    }

    /// Dispatches at most one ready source; returns whether one ran.
    pub fn iteration(&self, may_block: bool) -> bool {
        unsafe { ffi::g_main_context_iteration(self.as_ptr(), may_block as ffi::gboolean) != ffi::GFALSE }
    }

    pub fn pending(&self) -> bool {
        unsafe { ffi::g_main_context_pending(self.as_ptr()) != ffi::GFALSE }
    }

    pub fn wakeup(&self) {
        unsafe { ffi::g_main_context_wakeup(self.as_ptr()) }
    }

    /// Calls `f` whenever nothing of higher priority is ready, until it
    /// returns `false`.
    pub fn idle_add<F>(&self, f: F) -> Result<SourceId>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let source = unsafe { ffi::g_idle_source_new() };
        self.attach(source, Closure::new::<F, ()>(f))
    }

    /// Calls `f` every `interval_ms` milliseconds until it returns `false`.
    pub fn timeout_add<F>(&self, interval_ms: u32, f: F) -> Result<SourceId>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let source = unsafe { ffi::g_timeout_source_new(interval_ms) };
        self.attach(source, Closure::new::<F, ()>(f))
    }

    fn attach(&self, source: *mut ffi::GSource, closure: Closure) -> Result<SourceId> {
        if source.is_null() {
            return Err(BridgeError::NullPointer);
        }
        let id = unsafe {
            ffi::g_source_set_closure(source, closure.as_ptr());
            let id = ffi::g_source_attach(source, self.as_ptr());
            // The context keeps the source alive from here on
            ffi::g_source_unref(source);
            id
        };
        if id == 0 {
            return Err(BridgeError::NullPointer);
        }
        log::debug!("attached source {} (closure {:p})", id, closure.as_ptr());
        Ok(SourceId(id))
    }

    /// Removes a source attached to this context; `false` if it is gone.
    pub fn remove_source(&self, id: SourceId) -> bool {
        let source = unsafe { ffi::g_main_context_find_source_by_id(self.as_ptr(), id.0) };
        if source.is_null() {
            return false;
        }
        unsafe { ffi::g_source_destroy(source) };
        true
    }
}

impl Clone for MainContext {
    fn clone(&self) -> Self {
        unsafe { ffi::g_main_context_ref(self.as_ptr()) };
        MainContext { ptr: self.ptr }
    }
}

impl Drop for MainContext {
    fn drop(&mut self) {
        unsafe { ffi::g_main_context_unref(self.as_ptr()) }
    }
}

impl fmt::Debug for MainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MainContext").field(&self.ptr).finish()
    }
}

/// Adds an idle callback to the default context.
pub fn idle_add<F>(f: F) -> Result<SourceId>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    MainContext::default()?.idle_add(f)
}

/// Adds a timeout callback to the default context.
pub fn timeout_add<F>(interval_ms: u32, f: F) -> Result<SourceId>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    MainContext::default()?.timeout_add(interval_ms, f)
}

/// Removes a source from the default context.
pub fn source_remove(id: SourceId) -> bool {
    unsafe { ffi::g_source_remove(id.0) != ffi::GFALSE }
}

pub struct MainLoop {
    ptr: NonNull<ffi::GMainLoop>,
}

unsafe impl Send for MainLoop {}
unsafe impl Sync for MainLoop {}

impl MainLoop {
    /// A loop over `context`, or over the default context when `None`.
    pub fn new(context: Option<&MainContext>) -> Result<MainLoop> {
        let ctx = context.map_or(ptr::null_mut(), MainContext::as_ptr);
        let ptr = unsafe { ffi::g_main_loop_new(ctx, ffi::GFALSE) };
        NonNull::new(ptr).map(|ptr| MainLoop { ptr }).ok_or(BridgeError::NullPointer)
    }

    /// Iterates the context until [`MainLoop::quit`] is called.
    pub fn run(&self) {
        unsafe { ffi::g_main_loop_run(self.ptr.as_ptr()) }
    }

    pub fn quit(&self) {
        unsafe { ffi::g_main_loop_quit(self.ptr.as_ptr()) }
    }

    pub fn is_running(&self) -> bool {
        unsafe { ffi::g_main_loop_is_running(self.ptr.as_ptr()) != ffi::GFALSE }
    }

    pub fn context(&self) -> Option<MainContext> {
        unsafe { MainContext::from_glib_none(ffi::g_main_loop_get_context(self.ptr.as_ptr())) }
    }
}

impl Drop for MainLoop {
    fn drop(&mut self) {
        unsafe { ffi::g_main_loop_unref(self.ptr.as_ptr()) }
    }
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("ptr", &self.ptr)
            .field("running", &self.is_running())
            .finish()
    }
}
