use std::ffi::{c_int, c_void, CStr};
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use crate::error::CallError;
use crate::frame::{self, StackFrame};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::oid::Oid;
use crate::raw::{self, git_diff, git_diff_delta, git_diff_file, git_diff_hunk, git_diff_line};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Unmodified,
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    Ignored,
    Untracked,
    Typechange,
    Unreadable,
    Conflicted,
}

impl Delta {
    fn from_raw(status: c_int) -> Delta {
        match status {
            raw::GIT_DELTA_ADDED => Delta::Added,
            raw::GIT_DELTA_DELETED => Delta::Deleted,
            raw::GIT_DELTA_MODIFIED => Delta::Modified,
            raw::GIT_DELTA_RENAMED => Delta::Renamed,
            raw::GIT_DELTA_COPIED => Delta::Copied,
            raw::GIT_DELTA_IGNORED => Delta::Ignored,
            raw::GIT_DELTA_UNTRACKED => Delta::Untracked,
            raw::GIT_DELTA_TYPECHANGE => Delta::Typechange,
            raw::GIT_DELTA_UNREADABLE => Delta::Unreadable,
            raw::GIT_DELTA_CONFLICTED => Delta::Conflicted,
            _ => Delta::Unmodified,
        }
    }
}

#[derive(Clone, Copy)]
pub struct DiffDelta<'a> {
    raw: *const git_diff_delta,
    _marker: PhantomData<&'a git_diff_delta>,
}

impl<'a> DiffDelta<'a> {
    unsafe fn from_raw(raw: *const git_diff_delta) -> DiffDelta<'a> {
        DiffDelta {
            raw,
            _marker: PhantomData,
        }
    }

    fn get(&self) -> &'a git_diff_delta {
        unsafe { &*self.raw }
    }

    pub fn status(&self) -> Delta {
        Delta::from_raw(self.get().status)
    }

    pub fn flags(&self) -> u32 {
        self.get().flags
    }

    pub fn similarity(&self) -> u16 {
        self.get().similarity
    }

    pub fn nfiles(&self) -> u16 {
        self.get().nfiles
    }

    pub fn old_file(&self) -> DiffFile<'a> {
        DiffFile {
            raw: &self.get().old_file,
        }
    }

    pub fn new_file(&self) -> DiffFile<'a> {
        DiffFile {
            raw: &self.get().new_file,
        }
    }
}

impl fmt::Debug for DiffDelta<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffDelta")
            .field("status", &self.status())
            .field("old_file", &self.old_file())
            .field("new_file", &self.new_file())
            .finish()
    }
}

#[derive(Clone, Copy)]
pub struct DiffFile<'a> {
    raw: &'a git_diff_file,
}

impl<'a> DiffFile<'a> {
    pub fn id(&self) -> Oid {
        Oid::from_bytes(self.raw.id.id)
    }

    pub fn path_bytes(&self) -> Option<&'a [u8]> {
        if self.raw.path.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(self.raw.path).to_bytes() })
        }
    }

    pub fn path(&self) -> Option<&'a Path> {
        use std::os::unix::ffi::OsStrExt as _;
        self.path_bytes()
            .map(|b| Path::new(std::ffi::OsStr::from_bytes(b)))
    }

    pub fn size(&self) -> u64 {
        self.raw.size
    }

    pub fn mode(&self) -> u16 {
        self.raw.mode
    }
}

impl fmt::Debug for DiffFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffFile")
            .field("id", &self.id())
            .field("path", &self.path())
            .field("size", &self.size())
            .finish()
    }
}

#[derive(Clone, Copy)]
pub struct DiffHunk<'a> {
    raw: &'a git_diff_hunk,
}

impl<'a> DiffHunk<'a> {
    pub fn old_start(&self) -> u32 {
        self.raw.old_start as u32
    }

    pub fn old_lines(&self) -> u32 {
        self.raw.old_lines as u32
    }

    pub fn new_start(&self) -> u32 {
        self.raw.new_start as u32
    }

    pub fn new_lines(&self) -> u32 {
        self.raw.new_lines as u32
    }

    pub fn header(&self) -> &'a [u8] {
        let len = self.raw.header_len.min(self.raw.header.len());
        unsafe { std::slice::from_raw_parts(self.raw.header.as_ptr().cast::<u8>(), len) }
    }
}

impl fmt::Debug for DiffHunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffHunk")
            .field("header", &String::from_utf8_lossy(self.header()))
            .finish()
    }
}

#[derive(Clone, Copy)]
pub struct DiffLine<'a> {
    raw: &'a git_diff_line,
}

impl<'a> DiffLine<'a> {
    /// `' '`, `'+'`, `'-'` for content lines; the other libgit2 origin
    /// markers for file headers, hunk headers and EOF newline changes.
    pub fn origin(&self) -> char {
        self.raw.origin as u8 as char
    }

    pub fn old_lineno(&self) -> Option<u32> {
        (self.raw.old_lineno >= 0).then_some(self.raw.old_lineno as u32)
    }

    pub fn new_lineno(&self) -> Option<u32> {
        (self.raw.new_lineno >= 0).then_some(self.raw.new_lineno as u32)
    }

    pub fn num_lines(&self) -> u32 {
        self.raw.num_lines as u32
    }

    pub fn content_offset(&self) -> i64 {
        self.raw.content_offset
    }

    pub fn content(&self) -> &'a [u8] {
        if self.raw.content.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.raw.content.cast::<u8>(), self.raw.content_len) }
    }
}

impl fmt::Debug for DiffLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffLine")
            .field("origin", &self.origin())
            .field("old_lineno", &self.old_lineno())
            .field("new_lineno", &self.new_lineno())
            .field("content", &String::from_utf8_lossy(self.content()))
            .finish()
    }
}

pub type FileCb<'a, E> = dyn FnMut(DiffDelta<'_>, f32) -> Result<(), E> + 'a;
pub type HunkCb<'a, E> = dyn FnMut(DiffDelta<'_>, DiffHunk<'_>) -> Result<(), E> + 'a;
pub type LineCb<'a, E> = dyn FnMut(DiffDelta<'_>, Option<DiffHunk<'_>>, DiffLine<'_>) -> Result<(), E> + 'a;

struct ForeachCallbacks<'a, E> {
    file: Option<&'a mut FileCb<'a, E>>,
    hunk: Option<&'a mut HunkCb<'a, E>>,
    line: Option<&'a mut LineCb<'a, E>>,
}

/// Borrowed view of a native diff.
pub struct Diff {
    lib: &'static NativeLibrary,
    raw: *mut git_diff,
}

impl Diff {
    /// # Safety
    ///
    /// `raw` must be a valid diff of `lib` that outlives the returned view.
    pub unsafe fn from_raw(lib: &'static NativeLibrary, raw: *mut git_diff) -> Diff {
        Diff { lib, raw }
    }

    /// Iterates over the deltas, hunks and lines of the diff. Only the
    /// callbacks that are given are handed to native code.
    pub fn foreach<'a, E>(
        &self,
        file_cb: Option<&'a mut FileCb<'a, E>>,
        hunk_cb: Option<&'a mut HunkCb<'a, E>>,
        line_cb: Option<&'a mut LineCb<'a, E>>,
    ) -> Result<(), CallError<E>>
    where
        E: fmt::Display,
    {
        let lib = self.lib;
        let diff = self.raw;
        let want_file = file_cb.is_some();
        let want_hunk = hunk_cb.is_some();
        let want_line = line_cb.is_some();
        let callbacks = ForeachCallbacks {
            file: file_cb,
            hunk: hunk_cb,
            line: line_cb,
        };
        StackFrame::<ForeachCallbacks<'a, E>, E>::new(lib, callbacks)
            .run(CallbackKind::Diff, |payload| unsafe {
                (lib.diff_foreach)(
                    diff,
                    if want_file { Some(file_cb_c::<E>) } else { None },
                    None,
                    if want_hunk { Some(hunk_cb_c::<E>) } else { None },
                    if want_line { Some(line_cb_c::<E>) } else { None },
                    payload,
                )
            })
            .map(drop)
    }
}

unsafe extern "C" fn file_cb_c<E: fmt::Display>(
    delta: *const git_diff_delta,
    progress: f32,
    payload: *mut c_void,
) -> c_int {
    frame::dispatch::<ForeachCallbacks<'_, E>, E>(payload, CallbackKind::Diff, |_, cbs| {
        match cbs.file.as_mut() {
            Some(cb) => cb(DiffDelta::from_raw(delta), progress).map(|()| 0),
            None => Ok(0),
        }
    })
}

unsafe extern "C" fn hunk_cb_c<E: fmt::Display>(
    delta: *const git_diff_delta,
    hunk: *const git_diff_hunk,
    payload: *mut c_void,
) -> c_int {
    frame::dispatch::<ForeachCallbacks<'_, E>, E>(payload, CallbackKind::Diff, |_, cbs| {
        match (cbs.hunk.as_mut(), hunk.as_ref()) {
            (Some(cb), Some(hunk)) => cb(DiffDelta::from_raw(delta), DiffHunk { raw: hunk }).map(|()| 0),
            _ => Ok(0),
        }
    })
}

unsafe extern "C" fn line_cb_c<E: fmt::Display>(
    delta: *const git_diff_delta,
    hunk: *const git_diff_hunk,
    line: *const git_diff_line,
    payload: *mut c_void,
) -> c_int {
    frame::dispatch::<ForeachCallbacks<'_, E>, E>(payload, CallbackKind::Diff, |_, cbs| {
        match (cbs.line.as_mut(), line.as_ref()) {
            (Some(cb), Some(line)) => {
                let hunk = hunk.as_ref().map(|raw| DiffHunk { raw });
                cb(DiffDelta::from_raw(delta), hunk, DiffLine { raw: line }).map(|()| 0)
            }
            _ => Ok(0),
        }
    })
}
