use std::ffi::{c_char, c_int, c_void};
use std::fmt;

use crate::error::CallError;
use crate::frame::{self, StackFrame};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::raw::{git_repository, git_submodule};
use crate::util;

/// A submodule borrowed for the duration of one callback.
#[derive(Debug)]
pub struct Submodule<'a> {
    raw: *mut git_submodule,
    name: &'a str,
}

impl<'a> Submodule<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn raw(&self) -> *mut git_submodule {
        self.raw
    }
}

/// Borrowed view of a native repository.
pub struct Repository {
    lib: &'static NativeLibrary,
    raw: *mut git_repository,
}

impl Repository {
    /// # Safety
    ///
    /// `raw` must be a valid repository of `lib` that outlives the view.
    pub unsafe fn from_raw(lib: &'static NativeLibrary, raw: *mut git_repository) -> Repository {
        Repository { lib, raw }
    }

    pub fn lib(&self) -> &'static NativeLibrary {
        self.lib
    }

    pub fn raw(&self) -> *mut git_repository {
        self.raw
    }

    pub fn submodule_foreach<F, E>(&self, callback: F) -> Result<(), CallError<E>>
    where
        F: FnMut(&Submodule<'_>) -> Result<(), E>,
        E: fmt::Display,
    {
        let lib = self.lib;
        let repo = self.raw;
        StackFrame::<F, E>::new(lib, callback)
            .run(CallbackKind::Submodule, |payload| unsafe {
                (lib.submodule_foreach)(repo, Some(submodule_cb::<F, E>), payload)
            })
            .map(drop)
    }
}

unsafe extern "C" fn submodule_cb<F, E>(
    sm: *mut git_submodule,
    name: *const c_char,
    payload: *mut c_void,
) -> c_int
where
    F: FnMut(&Submodule<'_>) -> Result<(), E>,
    E: fmt::Display,
{
    frame::dispatch::<F, E>(payload, CallbackKind::Submodule, |_, callback| {
        let name = util::lossy(name);
        callback(&Submodule { raw: sm, name: &name }).map(|()| 0)
    })
}
