use std::ffi::{c_char, c_int, c_uint, c_void, CString};
use std::fmt;
use std::mem;

use git2_alloc_trace::AllocatorVTable;

use crate::capture::ErrorCapture;
use crate::error::Error;
use crate::raw::*;

/// Entry points of the wrapped native library.
///
/// Everything in this crate reaches native code through one of these tables.
/// Whoever builds a table vouches that each pointer has the libgit2 contract
/// of the function it is named after; the bridge trusts that without further
/// checks.
#[derive(Clone, Copy)]
pub struct NativeLibrary {
    pub error_last: unsafe extern "C" fn() -> *const git_error,
    pub error_set_str: unsafe extern "C" fn(class: c_int, message: *const c_char) -> c_int,
    pub error_clear: unsafe extern "C" fn(),

    pub tree_walk: unsafe extern "C" fn(
        tree: *const git_tree,
        mode: c_int,
        callback: git_treewalk_cb,
        payload: *mut c_void,
    ) -> c_int,
    pub tree_entry_name: unsafe extern "C" fn(entry: *const git_tree_entry) -> *const c_char,
    pub tree_entry_id: unsafe extern "C" fn(entry: *const git_tree_entry) -> *const git_oid,
    pub tree_entry_filemode: unsafe extern "C" fn(entry: *const git_tree_entry) -> c_int,

    pub diff_foreach: unsafe extern "C" fn(
        diff: *mut git_diff,
        file_cb: git_diff_file_cb,
        binary_cb: git_diff_binary_cb,
        hunk_cb: git_diff_hunk_cb,
        line_cb: git_diff_line_cb,
        payload: *mut c_void,
    ) -> c_int,
    pub packbuilder_foreach: unsafe extern "C" fn(
        pb: *mut git_packbuilder,
        callback: git_packbuilder_foreach_cb,
        payload: *mut c_void,
    ) -> c_int,
    pub odb_foreach:
        unsafe extern "C" fn(odb: *mut git_odb, callback: git_odb_foreach_cb, payload: *mut c_void) -> c_int,
    pub submodule_foreach: unsafe extern "C" fn(
        repo: *mut git_repository,
        callback: git_submodule_cb,
        payload: *mut c_void,
    ) -> c_int,

    pub index_add_all: unsafe extern "C" fn(
        index: *mut git_index,
        pathspec: *const git_strarray,
        flags: c_uint,
        callback: git_index_matched_path_cb,
        payload: *mut c_void,
    ) -> c_int,
    pub index_update_all: unsafe extern "C" fn(
        index: *mut git_index,
        pathspec: *const git_strarray,
        callback: git_index_matched_path_cb,
        payload: *mut c_void,
    ) -> c_int,
    pub index_remove_all: unsafe extern "C" fn(
        index: *mut git_index,
        pathspec: *const git_strarray,
        callback: git_index_matched_path_cb,
        payload: *mut c_void,
    ) -> c_int,

    pub rebase_options_init: unsafe extern "C" fn(opts: *mut git_rebase_options, version: c_uint) -> c_int,
    pub rebase_init: unsafe extern "C" fn(
        out: *mut *mut git_rebase,
        repo: *mut git_repository,
        opts: *const git_rebase_options,
    ) -> c_int,
    pub rebase_commit: unsafe extern "C" fn(
        id: *mut git_oid,
        rebase: *mut git_rebase,
        author: *const git_signature,
        committer: *const git_signature,
        message_encoding: *const c_char,
        message: *const c_char,
    ) -> c_int,
    pub rebase_free: unsafe extern "C" fn(rebase: *mut git_rebase),

    pub remote_init_callbacks:
        unsafe extern "C" fn(callbacks: *mut git_remote_callbacks, version: c_uint) -> c_int,
    pub fetch_options_init: unsafe extern "C" fn(opts: *mut git_fetch_options, version: c_uint) -> c_int,
    pub push_options_init: unsafe extern "C" fn(opts: *mut git_push_options, version: c_uint) -> c_int,
    pub remote_connect: unsafe extern "C" fn(
        remote: *mut git_remote,
        direction: c_int,
        callbacks: *const git_remote_callbacks,
        proxy_opts: *const git_proxy_options,
        custom_headers: *const git_strarray,
    ) -> c_int,
    pub remote_fetch: unsafe extern "C" fn(
        remote: *mut git_remote,
        refspecs: *const git_strarray,
        opts: *const git_fetch_options,
        reflog_message: *const c_char,
    ) -> c_int,
    pub remote_push: unsafe extern "C" fn(
        remote: *mut git_remote,
        refspecs: *const git_strarray,
        opts: *const git_push_options,
    ) -> c_int,
    pub remote_free: unsafe extern "C" fn(remote: *mut git_remote),

    pub credential_userpass_plaintext_new: unsafe extern "C" fn(
        out: *mut *mut git_credential,
        username: *const c_char,
        password: *const c_char,
    ) -> c_int,
    pub credential_default_new: unsafe extern "C" fn(out: *mut *mut git_credential) -> c_int,
    pub credential_free: unsafe extern "C" fn(cred: *mut git_credential),

    pub stdalloc_init_allocator: unsafe extern "C" fn(allocator: *mut AllocatorVTable) -> c_int,
    pub set_allocator: unsafe extern "C" fn(allocator: *const AllocatorVTable) -> c_int,
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary").finish_non_exhaustive()
    }
}

impl NativeLibrary {
    pub(crate) fn set_error(&self, class: c_int, message: &str) {
        let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
        unsafe {
            (self.error_set_str)(class, message.as_ptr());
        }
    }

    pub fn clear_error(&self) {
        unsafe { (self.error_clear)() }
    }

    /// Runs one of the library's `*_init` functions over a zeroed struct.
    ///
    /// # Safety
    ///
    /// `T` must be one of the C option structs of `raw`, all of which are
    /// valid when zeroed, and `init` must be the matching initializer.
    pub(crate) unsafe fn init_options<T>(
        &self,
        init: unsafe extern "C" fn(*mut T, c_uint) -> c_int,
        version: c_uint,
    ) -> Result<T, Error> {
        let mut opts: T = mem::zeroed();
        self.check(init(&mut opts, version))?;
        Ok(opts)
    }

    /// `Ok(code)` for non-negative codes, the native error otherwise.
    pub fn check(&self, code: c_int) -> Result<c_int, Error> {
        if code < 0 {
            Err(Error::last(self, code))
        } else {
            Ok(code)
        }
    }
}

/// Moves a captured callback message into the native error state when the
/// trampoline is reporting failure, and hands `status` back unchanged.
pub fn apply_capture(lib: &NativeLibrary, capture: &mut ErrorCapture, status: c_int) -> c_int {
    if let Some(message) = capture.take() {
        if status < 0 {
            lib.set_error(GIT_ERROR_CALLBACK, &message);
        }
    }
    status
}
