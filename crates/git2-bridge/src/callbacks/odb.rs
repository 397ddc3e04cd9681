use std::ffi::{c_int, c_void};
use std::fmt;

use crate::error::CallError;
use crate::frame::{self, StackFrame};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::oid::Oid;
use crate::raw::{git_odb, git_oid};

/// Borrowed view of a native object database.
pub struct Odb {
    lib: &'static NativeLibrary,
    raw: *mut git_odb,
}

impl Odb {
    /// # Safety
    ///
    /// `raw` must be a valid object database of `lib` that outlives the view.
    pub unsafe fn from_raw(lib: &'static NativeLibrary, raw: *mut git_odb) -> Odb {
        Odb { lib, raw }
    }

    pub fn foreach<F, E>(&self, callback: F) -> Result<(), CallError<E>>
    where
        F: FnMut(&Oid) -> Result<(), E>,
        E: fmt::Display,
    {
        let lib = self.lib;
        let odb = self.raw;
        StackFrame::<F, E>::new(lib, callback)
            .run(CallbackKind::Odb, |payload| unsafe {
                (lib.odb_foreach)(odb, Some(foreach_cb::<F, E>), payload)
            })
            .map(drop)
    }
}

unsafe extern "C" fn foreach_cb<F, E>(id: *const git_oid, payload: *mut c_void) -> c_int
where
    F: FnMut(&Oid) -> Result<(), E>,
    E: fmt::Display,
{
    frame::dispatch::<F, E>(payload, CallbackKind::Odb, |_, callback| {
        callback(&Oid::from_raw(id)).map(|()| 0)
    })
}
