//! Stack-local callbacks: the context lives on the stack of the call that
//! hands it to native code and is only reachable until that call returns.

use std::any::Any;
use std::ffi::{c_int, c_void};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::capture::ErrorCapture;
use crate::error::{CallError, Error};
use crate::handles::{resolve, CallbackKind, ContextPtr, ScopedHandle};
use crate::native::{self, NativeLibrary};
use crate::raw::GIT_EUSER;

pub(crate) struct StackFrame<F, E> {
    lib: &'static NativeLibrary,
    callback: F,
    error: Option<E>,
    panic: Option<Box<dyn Any + Send>>,
}

impl<F, E> StackFrame<F, E> {
    pub(crate) fn new(lib: &'static NativeLibrary, callback: F) -> StackFrame<F, E> {
        StackFrame {
            lib,
            callback,
            error: None,
            panic: None,
        }
    }

    fn failed(&self) -> bool {
        self.error.is_some() || self.panic.is_some()
    }

    /// Registers the frame, runs `call` with its handle as the payload and
    /// releases the handle before looking at the outcome. A panic raised by
    /// the callback resumes here once native code has returned.
    pub(crate) fn run(
        mut self,
        kind: CallbackKind,
        call: impl FnOnce(*mut c_void) -> c_int,
    ) -> Result<c_int, CallError<E>> {
        let code = {
            let scope = ScopedHandle::register(ContextPtr::new(&mut self as *mut Self, kind));
            call(scope.handle().as_payload())
        };
        if let Some(payload) = self.panic.take() {
            panic::resume_unwind(payload);
        }
        if let Some(err) = self.error.take() {
            return Err(CallError::Callback(err));
        }
        if code < 0 {
            return Err(Error::last(self.lib, code).into());
        }
        Ok(code)
    }
}

/// Runs `body` against the frame registered under `payload`.
///
/// # Safety
///
/// `payload` must have been registered by [`StackFrame::run`] with the same
/// `F`, `E` and `kind`, and that call must still be on the stack.
pub(crate) unsafe fn dispatch<F, E>(
    payload: *mut c_void,
    kind: CallbackKind,
    body: impl FnOnce(&'static NativeLibrary, &mut F) -> Result<c_int, E>,
) -> c_int
where
    E: fmt::Display,
{
    let frame = &mut *(resolve(payload, kind) as *mut StackFrame<F, E>);
    let lib = frame.lib;
    if frame.failed() {
        return GIT_EUSER;
    }

    let mut capture = ErrorCapture::new();
    let status = match panic::catch_unwind(AssertUnwindSafe(|| body(lib, &mut frame.callback))) {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            capture.set(err.to_string());
            frame.error = Some(err);
            GIT_EUSER
        }
        Err(payload) => {
            capture.set(format!("callback panicked: {}", panic_message(&*payload)));
            frame.panic = Some(payload);
            GIT_EUSER
        }
    };
    native::apply_capture(lib, &mut capture, status)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
