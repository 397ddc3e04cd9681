use std::ffi::{c_char, c_int, c_uint, c_void, OsStr};
use std::fmt;
use std::ops::BitOr;
use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;
use std::ptr;

use crate::error::CallError;
use crate::frame::{self, StackFrame};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::raw::{self, git_index, git_index_matched_path_cb};
use crate::util::{self, StrArray};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexAddOption(c_uint);

impl IndexAddOption {
    pub const DEFAULT: IndexAddOption = IndexAddOption(raw::GIT_INDEX_ADD_DEFAULT);
    pub const FORCE: IndexAddOption = IndexAddOption(raw::GIT_INDEX_ADD_FORCE);
    pub const DISABLE_PATHSPEC_MATCH: IndexAddOption =
        IndexAddOption(raw::GIT_INDEX_ADD_DISABLE_PATHSPEC_MATCH);
    pub const CHECK_PATHSPEC: IndexAddOption = IndexAddOption(raw::GIT_INDEX_ADD_CHECK_PATHSPEC);

    pub fn bits(self) -> c_uint {
        self.0
    }
}

impl BitOr for IndexAddOption {
    type Output = IndexAddOption;

    fn bitor(self, rhs: IndexAddOption) -> IndexAddOption {
        IndexAddOption(self.0 | rhs.0)
    }
}

/// Decision for one path matched by a bulk index operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Apply,
    Skip,
}

/// Receives each matched path and the pathspec that matched it.
pub type IndexMatchedPath<'a, E> = dyn FnMut(&Path, &[u8]) -> Result<IndexAction, E> + 'a;

/// Borrowed view of a native index.
pub struct Index {
    lib: &'static NativeLibrary,
    raw: *mut git_index,
}

#[derive(Clone, Copy)]
enum Bulk {
    Add(IndexAddOption),
    Update,
    Remove,
}

impl Index {
    /// # Safety
    ///
    /// `raw` must be a valid index of `lib` that outlives the view.
    pub unsafe fn from_raw(lib: &'static NativeLibrary, raw: *mut git_index) -> Index {
        Index { lib, raw }
    }

    pub fn add_all<E: fmt::Display>(
        &mut self,
        pathspecs: &[&str],
        flags: IndexAddOption,
        cb: Option<&mut IndexMatchedPath<'_, E>>,
    ) -> Result<(), CallError<E>> {
        self.bulk(Bulk::Add(flags), pathspecs, cb)
    }

    pub fn update_all<E: fmt::Display>(
        &mut self,
        pathspecs: &[&str],
        cb: Option<&mut IndexMatchedPath<'_, E>>,
    ) -> Result<(), CallError<E>> {
        self.bulk(Bulk::Update, pathspecs, cb)
    }

    pub fn remove_all<E: fmt::Display>(
        &mut self,
        pathspecs: &[&str],
        cb: Option<&mut IndexMatchedPath<'_, E>>,
    ) -> Result<(), CallError<E>> {
        self.bulk(Bulk::Remove, pathspecs, cb)
    }

    fn bulk<E: fmt::Display>(
        &mut self,
        op: Bulk,
        pathspecs: &[&str],
        cb: Option<&mut IndexMatchedPath<'_, E>>,
    ) -> Result<(), CallError<E>> {
        let lib = self.lib;
        let index = self.raw;
        let owned = StrArray::new(pathspecs)?;
        let specs = owned.raw();
        let call = |callback: git_index_matched_path_cb, payload: *mut c_void| unsafe {
            match op {
                Bulk::Add(flags) => (lib.index_add_all)(index, &specs, flags.bits(), callback, payload),
                Bulk::Update => (lib.index_update_all)(index, &specs, callback, payload),
                Bulk::Remove => (lib.index_remove_all)(index, &specs, callback, payload),
            }
        };

        match cb {
            None => {
                lib.check(call(None, ptr::null_mut()))?;
                Ok(())
            }
            Some(cb) => StackFrame::<&mut IndexMatchedPath<'_, E>, E>::new(lib, cb)
                .run(CallbackKind::IndexMatchedPath, |payload| {
                    call(Some(matched_path_cb::<E>), payload)
                })
                .map(drop),
        }
    }
}

unsafe extern "C" fn matched_path_cb<E: fmt::Display>(
    path: *const c_char,
    matched_pathspec: *const c_char,
    payload: *mut c_void,
) -> c_int {
    frame::dispatch::<&mut IndexMatchedPath<'_, E>, E>(
        payload,
        CallbackKind::IndexMatchedPath,
        |_, callback| {
            let path = Path::new(OsStr::from_bytes(util::opt_bytes(path).unwrap_or_default()));
            let spec = util::opt_bytes(matched_pathspec).unwrap_or_default();
            callback(path, spec).map(|action| match action {
                IndexAction::Apply => 0,
                IndexAction::Skip => 1,
            })
        },
    )
}
