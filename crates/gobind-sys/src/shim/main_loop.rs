use std::collections::HashMap;
use std::os::raw::c_uint;
use std::ptr;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{alloc_handle, free_handle, return_if_fail};
use crate::*;

enum SourceKind {
    Idle,
    Timeout { interval: Duration, deadline: Option<Instant> },
}

struct SourceRec {
    id: c_uint,
    kind: SourceKind,
    closure: Option<usize>,
    context: Option<usize>,
    ref_count: u32,
    destroyed: bool,
}

struct ContextRec {
    ref_count: u32,
    /// Attached sources in attachment order.
    sources: Vec<usize>,
    /// Set by a wakeup; the next blocking wait returns at once.
    wakeup_pending: bool,
}

struct LoopRec {
    context: usize,
    running: bool,
    ref_count: u32,
}

struct LoopState {
    sources: HashMap<usize, SourceRec>,
    contexts: HashMap<usize, ContextRec>,
    loops: HashMap<usize, LoopRec>,
    default_context: Option<usize>,
    next_source_id: c_uint,
}

lazy_static! {
    static ref LOOP_STATE: Mutex<LoopState> = Mutex::new(LoopState {
        sources: HashMap::new(),
        contexts: HashMap::new(),
        loops: HashMap::new(),
        default_context: None,
        next_source_id: 1,
    });
    static ref WAKE: Condvar = Condvar::new();
}

/// Closures whose last source reference went away; released after unlocking.
type Released = Vec<usize>;

impl LoopState {
    fn default_context(&mut self) -> usize {
        if let Some(context) = self.default_context {
            return context;
        }
        let context = alloc_handle();
        self.contexts.insert(context, ContextRec { ref_count: 1, sources: Vec::new(), wakeup_pending: false });
        self.default_context = Some(context);
        context
    }

    fn resolve(&mut self, context: *mut GMainContext) -> usize {
        if context.is_null() {
            self.default_context()
        } else {
            context as usize
        }
    }

    fn new_source(&mut self, kind: SourceKind) -> usize {
        let source = alloc_handle();
        self.sources.insert(source, SourceRec {
            id: 0,
            kind,
            closure: None,
            context: None,
            ref_count: 1,
            destroyed: false,
        });
        source
    }

    fn destroy(&mut self, source: usize, released: &mut Released) {
        let Some(rec) = self.sources.get_mut(&source) else {
            return;
        };
        if rec.destroyed {
            return;
        }
        rec.destroyed = true;
        released.extend(rec.closure.take());
        if let Some(context) = rec.context {
            if let Some(ctx) = self.contexts.get_mut(&context) {
                ctx.sources.retain(|s| *s != source);
            }
            // Drop the reference the context held
            self.unref_source(source, released);
        }
    }

    fn unref_source(&mut self, source: usize, released: &mut Released) {
        let Some(rec) = self.sources.get_mut(&source) else {
            return;
        };
        rec.ref_count -= 1;
        if rec.ref_count > 0 {
            return;
        }
        if let Some(rec) = self.sources.remove(&source) {
            released.extend(rec.closure);
            unsafe { free_handle(source) };
        }
    }

    fn ready_source(&self, context: usize, now: Instant) -> Option<usize> {
        let ctx = self.contexts.get(&context)?;
        // Timeouts run at default priority, ahead of idles
        let timeout = ctx
            .sources
            .iter()
            .filter_map(|s| match self.sources.get(s)?.kind {
                SourceKind::Timeout { deadline: Some(deadline), .. } if deadline <= now => Some((deadline, *s)),
                _ => None,
            })
            .min_by_key(|(deadline, _)| *deadline)
            .map(|(_, s)| s);
        timeout.or_else(|| {
            ctx.sources
                .iter()
                .copied()
                .find(|s| matches!(self.sources.get(s), Some(SourceRec { kind: SourceKind::Idle, .. })))
        })
    }

    fn next_deadline(&self, context: usize) -> Option<Instant> {
        let ctx = self.contexts.get(&context)?;
        ctx.sources
            .iter()
            .filter_map(|s| match self.sources.get(s)?.kind {
                SourceKind::Timeout { deadline, .. } => deadline,
                SourceKind::Idle => None,
            })
            .min()
    }

    /// Consumes a pending wakeup.
    fn take_wakeup(&mut self, context: usize) -> bool {
        self.contexts
            .get_mut(&context)
            .is_some_and(|ctx| std::mem::replace(&mut ctx.wakeup_pending, false))
    }

    fn wake(&mut self, context: usize) {
        if let Some(ctx) = self.contexts.get_mut(&context) {
            ctx.wakeup_pending = true;
        }
        WAKE.notify_all();
    }
}

fn release_closures(released: Released) {
    for closure in released {
        unsafe { g_closure_unref(closure as *mut GClosure) };
    }
}

pub unsafe extern "C" fn g_main_context_new() -> *mut GMainContext {
    let context = alloc_handle();
    LOOP_STATE
        .lock()
        .contexts
        .insert(context, ContextRec { ref_count: 1, sources: Vec::new(), wakeup_pending: false });
    context as *mut GMainContext
}

pub unsafe extern "C" fn g_main_context_default() -> *mut GMainContext {
    LOOP_STATE.lock().default_context() as *mut GMainContext
}

pub unsafe extern "C" fn g_main_context_ref(context: *mut GMainContext) -> *mut GMainContext {
    match LOOP_STATE.lock().contexts.get_mut(&(context as usize)) {
        Some(ctx) => ctx.ref_count += 1,
        None => log::error!("g_main_context_ref: assertion 'context != NULL' failed"),
    }
    context
}

pub unsafe extern "C" fn g_main_context_unref(context: *mut GMainContext) {
    let mut released = Released::new();
    {
        let mut state = LOOP_STATE.lock();
        let key = context as usize;
        let Some(ctx) = state.contexts.get_mut(&key) else {
            log::error!("g_main_context_unref: assertion 'context != NULL' failed");
            return;
        };
        ctx.ref_count -= 1;
        if ctx.ref_count == 0 && state.default_context != Some(key) {
            let sources = state.contexts.get(&key).map(|ctx| ctx.sources.clone()).unwrap_or_default();
            for source in sources {
                state.destroy(source, &mut released);
            }
            state.contexts.remove(&key);
            free_handle(key);
        }
    }
    release_closures(released);
}

pub unsafe extern "C" fn g_idle_source_new() -> *mut GSource {
    LOOP_STATE.lock().new_source(SourceKind::Idle) as *mut GSource
}

pub unsafe extern "C" fn g_timeout_source_new(interval: c_uint) -> *mut GSource {
    let kind = SourceKind::Timeout { interval: Duration::from_millis(interval as u64), deadline: None };
    LOOP_STATE.lock().new_source(kind) as *mut GSource
}

pub unsafe extern "C" fn g_source_set_closure(source: *mut GSource, closure: *mut GClosure) {
    return_if_fail!(!closure.is_null(), "g_source_set_closure");
    let previous = {
        let mut state = LOOP_STATE.lock();
        let Some(rec) = state.sources.get_mut(&(source as usize)) else {
            log::error!("g_source_set_closure: assertion 'source != NULL' failed");
            return;
        };
        rec.closure.replace(closure as usize)
    };
    g_closure_ref(closure);
    g_closure_sink(closure);
    release_closures(previous.into_iter().collect());
}

pub unsafe extern "C" fn g_source_attach(source: *mut GSource, context: *mut GMainContext) -> c_uint {
    let mut state = LOOP_STATE.lock();
    let context = state.resolve(context);
    return_if_fail!(state.contexts.contains_key(&context), "g_source_attach", 0);
    let id = state.next_source_id;
    let Some(rec) = state.sources.get_mut(&(source as usize)) else {
        log::error!("g_source_attach: assertion 'source != NULL' failed");
        return 0;
    };
    return_if_fail!(rec.context.is_none() && !rec.destroyed, "g_source_attach", 0);

    rec.id = id;
    rec.context = Some(context);
    rec.ref_count += 1;
    if let SourceKind::Timeout { interval, deadline } = &mut rec.kind {
        *deadline = Some(Instant::now() + *interval);
    }
    state.next_source_id += 1;
    if let Some(ctx) = state.contexts.get_mut(&context) {
        ctx.sources.push(source as usize);
    }
    state.wake(context);
    id
}

pub unsafe extern "C" fn g_source_destroy(source: *mut GSource) {
    let mut released = Released::new();
    LOOP_STATE.lock().destroy(source as usize, &mut released);
    release_closures(released);
}

pub unsafe extern "C" fn g_source_unref(source: *mut GSource) {
    let mut released = Released::new();
    LOOP_STATE.lock().unref_source(source as usize, &mut released);
    release_closures(released);
}

pub unsafe extern "C" fn g_main_context_find_source_by_id(
    context: *mut GMainContext,
    source_id: c_uint,
) -> *mut GSource {
    let mut state = LOOP_STATE.lock();
    let context = state.resolve(context);
    let Some(ctx) = state.contexts.get(&context) else {
        return ptr::null_mut();
    };
    ctx.sources
        .iter()
        .copied()
        .find(|s| state.sources.get(s).is_some_and(|rec| rec.id == source_id))
        .map_or(ptr::null_mut(), |s| s as *mut GSource)
}

pub unsafe extern "C" fn g_source_remove(tag: c_uint) -> gboolean {
    let source = g_main_context_find_source_by_id(ptr::null_mut(), tag);
    if source.is_null() {
        log::error!("Source ID {} was not found when attempting to remove it", tag);
        return GFALSE;
    }
    g_source_destroy(source);
    GTRUE
}

pub unsafe extern "C" fn g_main_context_pending(context: *mut GMainContext) -> gboolean {
    let mut state = LOOP_STATE.lock();
    let context = state.resolve(context);
    state.ready_source(context, Instant::now()).is_some() as gboolean
}

/// Picks the next ready source, blocking for one if asked to. The
/// returned source carries an extra reference for the dispatch.
fn next_ready(state: &mut MutexGuard<'_, LoopState>, context: usize, may_block: bool) -> Option<(usize, Option<usize>)> {
    loop {
        if let Some(source) = state.ready_source(context, Instant::now()) {
            let rec = state.sources.get_mut(&source)?;
            rec.ref_count += 1;
            let closure = rec.closure;
            if let Some(closure) = closure {
                unsafe { g_closure_ref(closure as *mut GClosure) };
            }
            return Some((source, closure));
        }
        if !may_block {
            return None;
        }

        // A wakeup that arrived before this wait still counts
        if state.take_wakeup(context) {
            return None;
        }
        match state.next_deadline(context) {
            Some(deadline) => {
                WAKE.wait_until(state, deadline);
            }
            None => WAKE.wait(state),
        }
        if state.ready_source(context, Instant::now()).is_none() && state.take_wakeup(context) {
            return None;
        }
    }
}

pub unsafe extern "C" fn g_main_context_iteration(context: *mut GMainContext, may_block: gboolean) -> gboolean {
    let (source, closure) = {
        let mut state = LOOP_STATE.lock();
        let context = state.resolve(context);
        return_if_fail!(state.contexts.contains_key(&context), "g_main_context_iteration", GFALSE);
        match next_ready(&mut state, context, may_block != GFALSE) {
            Some(ready) => ready,
            None => return GFALSE,
        }
    };

    let keep = match closure {
        Some(closure) => {
            let closure = closure as *mut GClosure;
            let mut ret = GValue::uninit();
            g_value_init(&mut ret, G_TYPE_BOOLEAN);
            g_closure_invoke(closure, &mut ret, 0, ptr::null(), ptr::null_mut());
            let keep = g_value_get_boolean(&ret) != GFALSE;
            g_value_unset(&mut ret);
            g_closure_unref(closure);
            keep
        }
        None => {
            log::warn!("g_main_context_iteration: source dispatched without a callback");
            false
        }
    };

    let mut released = Released::new();
    {
        let mut state = LOOP_STATE.lock();
        if keep {
            if let Some(SourceKind::Timeout { interval, deadline }) = state.sources.get_mut(&source).map(|rec| &mut rec.kind) {
                *deadline = Some(Instant::now() + *interval);
            }
        } else {
            state.destroy(source, &mut released);
        }
        state.unref_source(source, &mut released);
    }
    release_closures(released);
    GTRUE
}

pub unsafe extern "C" fn g_main_context_wakeup(context: *mut GMainContext) {
    let mut state = LOOP_STATE.lock();
    let context = state.resolve(context);
    state.wake(context);
}

pub unsafe extern "C" fn g_main_loop_new(context: *mut GMainContext, is_running: gboolean) -> *mut GMainLoop {
    let mut state = LOOP_STATE.lock();
    let context = state.resolve(context);
    let Some(ctx) = state.contexts.get_mut(&context) else {
        log::error!("g_main_loop_new: assertion 'context != NULL' failed");
        return ptr::null_mut();
    };
    ctx.ref_count += 1;
    let main_loop = alloc_handle();
    state.loops.insert(main_loop, LoopRec { context, running: is_running != GFALSE, ref_count: 1 });
    main_loop as *mut GMainLoop
}

fn loop_context(main_loop: *mut GMainLoop) -> Option<usize> {
    LOOP_STATE.lock().loops.get(&(main_loop as usize)).map(|l| l.context)
}

fn set_running(main_loop: *mut GMainLoop, running: bool) -> bool {
    match LOOP_STATE.lock().loops.get_mut(&(main_loop as usize)) {
        Some(l) => {
            l.running = running;
            true
        }
        None => false,
    }
}

pub unsafe extern "C" fn g_main_loop_run(main_loop: *mut GMainLoop) {
    let Some(context) = loop_context(main_loop) else {
        log::error!("g_main_loop_run: assertion 'loop != NULL' failed");
        return;
    };
    set_running(main_loop, true);
    while g_main_loop_is_running(main_loop) != GFALSE {
        g_main_context_iteration(context as *mut GMainContext, GTRUE);
    }
}

pub unsafe extern "C" fn g_main_loop_quit(main_loop: *mut GMainLoop) {
    if !set_running(main_loop, false) {
        log::error!("g_main_loop_quit: assertion 'loop != NULL' failed");
        return;
    }
    if let Some(context) = loop_context(main_loop) {
        g_main_context_wakeup(context as *mut GMainContext);
    }
}

pub unsafe extern "C" fn g_main_loop_is_running(main_loop: *mut GMainLoop) -> gboolean {
    LOOP_STATE
        .lock()
        .loops
        .get(&(main_loop as usize))
        .map_or(GFALSE, |l| l.running as gboolean)
}

pub unsafe extern "C" fn g_main_loop_get_context(main_loop: *mut GMainLoop) -> *mut GMainContext {
    loop_context(main_loop).map_or(ptr::null_mut(), |context| context as *mut GMainContext)
}

pub unsafe extern "C" fn g_main_loop_unref(main_loop: *mut GMainLoop) {
    let context = {
        let mut state = LOOP_STATE.lock();
        let key = main_loop as usize;
        let Some(l) = state.loops.get_mut(&key) else {
            return;
        };
        l.ref_count -= 1;
        if l.ref_count > 0 {
            return;
        }
        let context = l.context;
        state.loops.remove(&key);
        free_handle(key);
        context
    };
    g_main_context_unref(context as *mut GMainContext);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static TICKS: AtomicUsize = AtomicUsize::new(0);

    /// Returns TRUE until the third call.
    unsafe extern "C" fn tick(
        _closure: *mut GClosure,
        return_value: *mut GValue,
        _n_param_values: c_uint,
        _param_values: *const GValue,
        _hint: gpointer,
        _marshal_data: gpointer,
    ) {
        let n = TICKS.fetch_add(1, Ordering::SeqCst) + 1;
        g_value_set_boolean(return_value, (n < 3) as gboolean);
    }

    unsafe fn attach(source: *mut GSource, context: *mut GMainContext) -> c_uint {
        let closure = g_closure_new_simple(size_of::<GClosure>() as c_uint, ptr::null_mut());
        g_closure_set_marshal(closure, Some(tick));
        g_source_set_closure(source, closure);
        let id = g_source_attach(source, context);
        g_source_unref(source);
        id
    }

    #[test]
    fn test_idle_runs_until_false() {
        unsafe {
            let context = g_main_context_new();
            let id = attach(g_idle_source_new(), context);
            assert_ne!(id, 0);
            assert_eq!(g_main_context_pending(context), GTRUE);

            while g_main_context_iteration(context, GFALSE) != GFALSE {}
            assert_eq!(TICKS.load(Ordering::SeqCst), 3);
            assert!(g_main_context_find_source_by_id(context, id).is_null());
            assert_eq!(g_main_context_pending(context), GFALSE);
            g_main_context_unref(context);
        }
    }

    #[test]
    fn test_quit_wakes_blocked_loop() {
        unsafe {
            let context = g_main_context_new();
            let main_loop = g_main_loop_new(context, GFALSE);
            let handle = main_loop as usize;
            let quitter = std::thread::spawn(move || {
                while g_main_loop_is_running(handle as *mut GMainLoop) == GFALSE {
                    std::thread::sleep(Duration::from_millis(1));
                }
                g_main_loop_quit(handle as *mut GMainLoop);
            });
            g_main_loop_run(main_loop);
            assert_eq!(g_main_loop_is_running(main_loop), GFALSE);
            quitter.join().unwrap();
            g_main_loop_unref(main_loop);
            g_main_context_unref(context);
        }
    }
}
