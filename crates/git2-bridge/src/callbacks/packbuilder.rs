use std::ffi::{c_int, c_void};
use std::fmt;

use libc::size_t;

use crate::error::CallError;
use crate::frame::{self, StackFrame};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::raw::git_packbuilder;

/// Borrowed view of a native pack builder.
pub struct PackBuilder {
    lib: &'static NativeLibrary,
    raw: *mut git_packbuilder,
}

impl PackBuilder {
    /// # Safety
    ///
    /// `raw` must be a valid pack builder of `lib` that outlives the view.
    pub unsafe fn from_raw(lib: &'static NativeLibrary, raw: *mut git_packbuilder) -> PackBuilder {
        PackBuilder { lib, raw }
    }

    /// Streams the packfile in chunks as native code produces it.
    pub fn foreach<F, E>(&mut self, callback: F) -> Result<(), CallError<E>>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
        E: fmt::Display,
    {
        let lib = self.lib;
        let pb = self.raw;
        StackFrame::<F, E>::new(lib, callback)
            .run(CallbackKind::PackBuilder, |payload| unsafe {
                (lib.packbuilder_foreach)(pb, Some(foreach_cb::<F, E>), payload)
            })
            .map(drop)
    }
}

unsafe extern "C" fn foreach_cb<F, E>(buf: *mut c_void, size: size_t, payload: *mut c_void) -> c_int
where
    F: FnMut(&[u8]) -> Result<(), E>,
    E: fmt::Display,
{
    frame::dispatch::<F, E>(payload, CallbackKind::PackBuilder, |_, callback| {
        let chunk: &[u8] = if buf.is_null() || size == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(buf as *const u8, size)
        };
        callback(chunk).map(|()| 0)
    })
}
