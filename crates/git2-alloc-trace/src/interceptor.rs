#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_void};
use std::sync::{Mutex, MutexGuard, PoisonError};

use git2_bridge_core::{trap, BridgeFault};
use once_cell::sync::OnceCell;

use crate::config::{SetupError, TraceConfig};
use crate::event::{AllocEvent, CallSite};
use crate::frames::Frames;
use crate::sink::{EventSink, Sink};
use crate::vtable::AllocatorVTable;

const STRIPES: usize = 64;

/// Wraps a real allocator and reports every successful call to a sink.
///
/// Events for one address are ordered by a striped lock: a wrapper that
/// releases memory holds the stripe of the address across the real call and
/// the `Dealloc`, and a wrapper that obtains memory takes the stripe of the
/// result before emitting `Alloc`. No wrapper holds two stripes at once.
pub struct Interceptor<S> {
    real: AllocatorVTable,
    sink: S,
    backtrace_depth: usize,
    stripes: [Mutex<()>; STRIPES],
}

impl<S: EventSink> Interceptor<S> {
    pub fn new(real: AllocatorVTable, sink: S, backtrace_depth: usize) -> Interceptor<S> {
        Interceptor {
            real,
            sink,
            backtrace_depth,
            stripes: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn stripe(&self, addr: usize) -> MutexGuard<'_, ()> {
        self.stripes[(addr >> 4) % STRIPES]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: AllocEvent) {
        if let Err(err) = self.sink.emit(&event) {
            trap(BridgeFault::SinkWrite(err));
        }
    }

    unsafe fn record_alloc(&self, ptr: *mut c_void, size: usize, file: *const c_char, line: c_int) {
        let frames = Frames::capture(self.backtrace_depth).render(self.sink.symbolizes_frames());
        let site = CallSite::from_raw(file, line);
        let _order = self.stripe(ptr as usize);
        self.emit(AllocEvent::alloc(ptr as usize, size, site, frames));
    }

    pub unsafe fn malloc(&self, len: usize, file: *const c_char, line: c_int) -> *mut c_void {
        let ptr = (self.real.gmalloc)(len, file, line);
        if !ptr.is_null() {
            self.record_alloc(ptr, len, file, line);
        }
        ptr
    }

    pub unsafe fn calloc(
        &self,
        nelem: usize,
        elsize: usize,
        file: *const c_char,
        line: c_int,
    ) -> *mut c_void {
        let ptr = (self.real.gcalloc)(nelem, elsize, file, line);
        if !ptr.is_null() {
            self.record_alloc(ptr, nelem.saturating_mul(elsize), file, line);
        }
        ptr
    }

    pub unsafe fn strdup(&self, s: *const c_char, file: *const c_char, line: c_int) -> *mut c_char {
        let ptr = (self.real.gstrdup)(s, file, line);
        self.record_string(ptr, file, line);
        ptr
    }

    pub unsafe fn strndup(
        &self,
        s: *const c_char,
        n: usize,
        file: *const c_char,
        line: c_int,
    ) -> *mut c_char {
        let ptr = (self.real.gstrndup)(s, n, file, line);
        self.record_string(ptr, file, line);
        ptr
    }

    pub unsafe fn substrdup(
        &self,
        s: *const c_char,
        n: usize,
        file: *const c_char,
        line: c_int,
    ) -> *mut c_char {
        let ptr = (self.real.gsubstrdup)(s, n, file, line);
        self.record_string(ptr, file, line);
        ptr
    }

    unsafe fn record_string(&self, ptr: *mut c_char, file: *const c_char, line: c_int) {
        if !ptr.is_null() {
            self.record_alloc(ptr.cast(), libc::strlen(ptr) + 1, file, line);
        }
    }

    pub unsafe fn mallocarray(
        &self,
        nelem: usize,
        elsize: usize,
        file: *const c_char,
        line: c_int,
    ) -> *mut c_void {
        let ptr = (self.real.gmallocarray)(nelem, elsize, file, line);
        if !ptr.is_null() {
            self.record_alloc(ptr, nelem.saturating_mul(elsize), file, line);
        }
        ptr
    }

    pub unsafe fn realloc(
        &self,
        ptr: *mut c_void,
        size: usize,
        file: *const c_char,
        line: c_int,
    ) -> *mut c_void {
        let real = self.real.grealloc;
        self.resize_with(ptr, size, file, line, |p| real(p, size, file, line))
    }

    pub unsafe fn reallocarray(
        &self,
        ptr: *mut c_void,
        nelem: usize,
        elsize: usize,
        file: *const c_char,
        line: c_int,
    ) -> *mut c_void {
        let real = self.real.greallocarray;
        self.resize_with(ptr, nelem.saturating_mul(elsize), file, line, |p| {
            real(p, nelem, elsize, file, line)
        })
    }

    unsafe fn resize_with(
        &self,
        old: *mut c_void,
        size: usize,
        file: *const c_char,
        line: c_int,
        call: impl FnOnce(*mut c_void) -> *mut c_void,
    ) -> *mut c_void {
        if old.is_null() {
            let new = call(old);
            if !new.is_null() {
                self.record_alloc(new, size, file, line);
            }
            return new;
        }

        let order = self.stripe(old as usize);
        let new = call(old);
        if new == old {
            self.emit(AllocEvent::resize(old as usize, size, CallSite::from_raw(file, line)));
            return new;
        }
        if new.is_null() {
            // A zero-size request releases the block; any other null is a
            // failed call that left `old` untouched.
            if size == 0 {
                self.emit(AllocEvent::dealloc(old as usize));
            }
            return new;
        }
        self.emit(AllocEvent::dealloc(old as usize));
        drop(order);
        self.record_alloc(new, size, file, line);
        new
    }

    pub unsafe fn free(&self, ptr: *mut c_void) {
        if ptr.is_null() {
            (self.real.gfree)(ptr);
            return;
        }
        let _order = self.stripe(ptr as usize);
        (self.real.gfree)(ptr);
        self.emit(AllocEvent::dealloc(ptr as usize));
    }
}

static INSTALLED: OnceCell<Interceptor<Sink>> = OnceCell::new();

/// Installs the process-wide interceptor and returns the vtable to hand to
/// the native library. There is no way to uninstall it.
pub fn install(
    real: AllocatorVTable,
    sink: Sink,
    backtrace_depth: usize,
) -> Result<&'static AllocatorVTable, SetupError> {
    let described = sink.describe();
    INSTALLED
        .set(Interceptor::new(real, sink, backtrace_depth))
        .map_err(|_| SetupError::AlreadyInstalled)?;
    log::info!("debug allocator installed, events go to {described}");
    Ok(&DEBUG_VTABLE)
}

/// Opens the sink named by `config` and installs over `real`.
pub fn install_with(
    real: AllocatorVTable,
    config: &TraceConfig,
) -> Result<&'static AllocatorVTable, SetupError> {
    if INSTALLED.get().is_some() {
        return Err(SetupError::AlreadyInstalled);
    }
    let sink = config.open_sink()?;
    install(real, sink, config.backtrace_depth)
}

pub fn installed() -> Option<&'static Interceptor<Sink>> {
    INSTALLED.get()
}

fn interceptor() -> &'static Interceptor<Sink> {
    match INSTALLED.get() {
        Some(i) => i,
        None => trap(BridgeFault::AllocatorNotInstalled),
    }
}

pub static DEBUG_VTABLE: AllocatorVTable = AllocatorVTable {
    gmalloc: debug_malloc,
    gcalloc: debug_calloc,
    gstrdup: debug_strdup,
    gstrndup: debug_strndup,
    gsubstrdup: debug_substrdup,
    grealloc: debug_realloc,
    greallocarray: debug_reallocarray,
    gmallocarray: debug_mallocarray,
    gfree: debug_free,
};

unsafe extern "C" fn debug_malloc(len: usize, file: *const c_char, line: c_int) -> *mut c_void {
    interceptor().malloc(len, file, line)
}

unsafe extern "C" fn debug_calloc(
    nelem: usize,
    elsize: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    interceptor().calloc(nelem, elsize, file, line)
}

unsafe extern "C" fn debug_strdup(s: *const c_char, file: *const c_char, line: c_int) -> *mut c_char {
    interceptor().strdup(s, file, line)
}

unsafe extern "C" fn debug_strndup(
    s: *const c_char,
    n: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_char {
    interceptor().strndup(s, n, file, line)
}

unsafe extern "C" fn debug_substrdup(
    s: *const c_char,
    n: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_char {
    interceptor().substrdup(s, n, file, line)
}

unsafe extern "C" fn debug_realloc(
    ptr: *mut c_void,
    size: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    interceptor().realloc(ptr, size, file, line)
}

unsafe extern "C" fn debug_reallocarray(
    ptr: *mut c_void,
    nelem: usize,
    elsize: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    interceptor().reallocarray(ptr, nelem, elsize, file, line)
}

unsafe extern "C" fn debug_mallocarray(
    nelem: usize,
    elsize: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    interceptor().mallocarray(nelem, elsize, file, line)
}

unsafe extern "C" fn debug_free(ptr: *mut c_void) {
    interceptor().free(ptr)
}
