use std::ffi::{c_char, c_int, c_void, CString};
use std::ptr;

use libc::size_t;

use crate::attached::{self, Attachment};
use crate::error::{CallbackError, Error};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::oid::Oid;
use crate::raw::{
    self, git_commit, git_oid, git_rebase, git_rebase_options, git_signature, git_time, git_tree,
};
use crate::util;

use super::repository::Repository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the epoch.
    pub time: i64,
    /// Timezone offset in minutes.
    pub offset_minutes: i32,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, time: i64, offset_minutes: i32) -> Signature {
        Signature {
            name: name.into(),
            email: email.into(),
            time,
            offset_minutes,
        }
    }

    unsafe fn from_raw(raw: *const git_signature) -> Option<Signature> {
        let raw = raw.as_ref()?;
        Some(Signature {
            name: util::lossy(raw.name).into_owned(),
            email: util::lossy(raw.email).into_owned(),
            time: raw.when.time,
            offset_minutes: raw.when.offset,
        })
    }
}

/// Owned C copy of a [`Signature`].
struct RawSignature {
    _name: CString,
    _email: CString,
    raw: git_signature,
}

impl RawSignature {
    fn new(sig: &Signature) -> Result<RawSignature, Error> {
        let name = util::to_cstring(&sig.name)?;
        let email = util::to_cstring(&sig.email)?;
        let raw = git_signature {
            name: name.as_ptr() as *mut c_char,
            email: email.as_ptr() as *mut c_char,
            when: git_time {
                time: sig.time,
                offset: sig.offset_minutes,
                sign: if sig.offset_minutes < 0 { b'-' as c_char } else { b'+' as c_char },
            },
        };
        Ok(RawSignature {
            _name: name,
            _email: email,
            raw,
        })
    }
}

/// The commit native code is about to create while rebasing.
#[derive(Debug)]
pub struct CommitCreate<'a> {
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
    pub message_encoding: Option<&'a str>,
    pub message: &'a str,
    pub tree: *const git_tree,
    pub parents: &'a [*const git_commit],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitCreateResult {
    /// The callback wrote the commit itself.
    Created(Oid),
    /// Let native code create the commit as usual.
    Passthrough,
}

type CommitCreateCb =
    dyn FnMut(&CommitCreate<'_>) -> Result<CommitCreateResult, CallbackError> + Send;

#[derive(Default)]
pub struct RebaseOptions {
    commit_create: Option<Box<CommitCreateCb>>,
}

impl RebaseOptions {
    pub fn new() -> RebaseOptions {
        RebaseOptions::default()
    }

    pub fn commit_create<F>(&mut self, cb: F) -> &mut RebaseOptions
    where
        F: FnMut(&CommitCreate<'_>) -> Result<CommitCreateResult, CallbackError> + Send + 'static,
    {
        self.commit_create = Some(Box::new(cb));
        self
    }
}

/// An in-progress rebase. The options stay registered until the rebase is
/// dropped.
pub struct Rebase {
    lib: &'static NativeLibrary,
    raw: *mut git_rebase,
    _attachment: Attachment<RebaseOptions>,
}

impl Repository {
    pub fn rebase(&self, opts: RebaseOptions) -> Result<Rebase, Error> {
        let lib = self.lib();
        let has_commit_create = opts.commit_create.is_some();
        let attachment = Attachment::new(lib, CallbackKind::Rebase, opts);
        let mut raw_opts: git_rebase_options =
            unsafe { lib.init_options(lib.rebase_options_init, raw::GIT_REBASE_OPTIONS_VERSION)? };
        if has_commit_create {
            raw_opts.commit_create_cb = Some(commit_create_cb);
        }
        raw_opts.payload = attachment.handle().as_payload();
        let mut out = ptr::null_mut();
        lib.check(unsafe { (lib.rebase_init)(&mut out, self.raw(), &raw_opts) })?;
        Ok(Rebase {
            lib,
            raw: out,
            _attachment: attachment,
        })
    }
}

impl Rebase {
    pub fn raw(&self) -> *mut git_rebase {
        self.raw
    }

    /// Commits the current patch. `None` for the message keeps the original.
    pub fn commit(
        &mut self,
        author: Option<&Signature>,
        committer: &Signature,
        message: Option<&str>,
    ) -> Result<Oid, Error> {
        let author = author.map(RawSignature::new).transpose()?;
        let committer = RawSignature::new(committer)?;
        let message = util::opt_cstring(message)?;
        let mut id = git_oid::default();
        let rc = unsafe {
            (self.lib.rebase_commit)(
                &mut id,
                self.raw,
                author.as_ref().map_or(ptr::null(), |a| &a.raw as *const git_signature),
                &committer.raw,
                ptr::null(),
                util::opt_ptr(&message),
            )
        };
        self.lib.check(rc)?;
        Ok(Oid::from_bytes(id.id))
    }
}

impl Drop for Rebase {
    fn drop(&mut self) {
        unsafe { (self.lib.rebase_free)(self.raw) }
    }
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn commit_create_cb(
    out: *mut git_oid,
    author: *const git_signature,
    committer: *const git_signature,
    message_encoding: *const c_char,
    message: *const c_char,
    tree: *const git_tree,
    parent_count: size_t,
    parents: *const *const git_commit,
    payload: *mut c_void,
) -> c_int {
    attached::dispatch::<RebaseOptions>(payload, CallbackKind::Rebase, |_, opts, capture| {
        let Some(cb) = opts.commit_create.as_mut() else {
            return raw::GIT_PASSTHROUGH;
        };
        let message = util::lossy(message);
        let parents: &[*const git_commit] = if parents.is_null() || parent_count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(parents, parent_count)
        };
        let commit = CommitCreate {
            author: Signature::from_raw(author),
            committer: Signature::from_raw(committer),
            message_encoding: util::opt_str(message_encoding),
            message: &message,
            tree,
            parents,
        };
        attached::status(capture, cb(&commit), |result| match result {
            CommitCreateResult::Created(id) => {
                if !out.is_null() {
                    *out = id.raw();
                }
                0
            }
            CommitCreateResult::Passthrough => raw::GIT_PASSTHROUGH,
        })
    })
}
