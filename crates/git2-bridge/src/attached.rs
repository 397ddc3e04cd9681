//! Callbacks attached to a long-lived native object. Native code may invoke
//! them from any stack and thread for as long as the object exists.

use std::ffi::{c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use crate::capture::ErrorCapture;
use crate::error::CallbackError;
use crate::frame::panic_message;
use crate::handles::{resolve, CallbackKind, ContextPtr, Handle, ScopedHandle};
use crate::native::{self, NativeLibrary};
use crate::raw::GIT_EUSER;

pub(crate) struct AttachedContext<C> {
    lib: &'static NativeLibrary,
    kind: CallbackKind,
    callbacks: Mutex<C>,
}

/// Owns an attached context and its registration. Fields drop in order, so
/// the handle is released before the context is freed.
pub(crate) struct Attachment<C> {
    scope: ScopedHandle,
    ctx: Box<AttachedContext<C>>,
}

impl<C> Attachment<C> {
    pub(crate) fn new(lib: &'static NativeLibrary, kind: CallbackKind, callbacks: C) -> Attachment<C> {
        let mut ctx = Box::new(AttachedContext {
            lib,
            kind,
            callbacks: Mutex::new(callbacks),
        });
        let scope = ScopedHandle::register(ContextPtr::new(&mut *ctx as *mut AttachedContext<C>, kind));
        Attachment { scope, ctx }
    }

    pub(crate) fn handle(&self) -> Handle {
        self.scope.handle()
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let mut callbacks = self.ctx.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut callbacks)
    }
}

/// Runs `body` against the callbacks registered under `payload` and turns any
/// failure into native error state plus `GIT_EUSER`.
///
/// # Safety
///
/// `payload` must belong to a live [`Attachment`] created with the same `C`
/// and `kind`.
pub(crate) unsafe fn dispatch<C>(
    payload: *mut c_void,
    kind: CallbackKind,
    body: impl FnOnce(&'static NativeLibrary, &mut C, &mut ErrorCapture) -> c_int,
) -> c_int {
    let ctx = &*(resolve(payload, kind) as *const AttachedContext<C>);
    let mut capture = ErrorCapture::new();
    let status = match panic::catch_unwind(AssertUnwindSafe(|| {
        let mut callbacks = ctx.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        body(ctx.lib, &mut callbacks, &mut capture)
    })) {
        Ok(code) => code,
        Err(payload) => {
            if !capture.is_set() {
                capture.set(format!("callback panicked: {}", panic_message(&*payload)));
            }
            GIT_EUSER
        }
    };
    if let Some(message) = capture.message() {
        log::debug!("{} callback failed: {message}", ctx.kind.name());
    }
    native::apply_capture(ctx.lib, &mut capture, status)
}

/// Maps a callback result to a native status, recording the failure.
pub(crate) fn status<T>(
    capture: &mut ErrorCapture,
    result: Result<T, CallbackError>,
    ok: impl FnOnce(T) -> c_int,
) -> c_int {
    match result {
        Ok(value) => ok(value),
        Err(err) => {
            capture.set(err.message());
            GIT_EUSER
        }
    }
}
