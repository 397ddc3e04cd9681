use std::ffi::{c_char, c_int, c_uint, c_void};
use std::marker::PhantomData;
use std::ptr;

use crate::attached::{self, Attachment};
use crate::error::{CallbackError, Error};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::oid::Oid;
use crate::raw::{
    self, git_cert, git_credential, git_indexer_progress, git_oid, git_remote, git_remote_callbacks,
    git_remote_completion_t,
};
use crate::util::{self, StrArray};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Fetch,
    Push,
}

/// Credential kinds a transport will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialType(c_uint);

impl CredentialType {
    pub const USER_PASS_PLAINTEXT: CredentialType = CredentialType(raw::GIT_CREDENTIAL_USERPASS_PLAINTEXT);
    pub const SSH_KEY: CredentialType = CredentialType(raw::GIT_CREDENTIAL_SSH_KEY);
    pub const SSH_CUSTOM: CredentialType = CredentialType(raw::GIT_CREDENTIAL_SSH_CUSTOM);
    pub const DEFAULT: CredentialType = CredentialType(raw::GIT_CREDENTIAL_DEFAULT);
    pub const SSH_INTERACTIVE: CredentialType = CredentialType(raw::GIT_CREDENTIAL_SSH_INTERACTIVE);
    pub const USERNAME: CredentialType = CredentialType(raw::GIT_CREDENTIAL_USERNAME);
    pub const SSH_MEMORY: CredentialType = CredentialType(raw::GIT_CREDENTIAL_SSH_MEMORY);

    pub fn from_bits(bits: c_uint) -> CredentialType {
        CredentialType(bits)
    }

    pub fn bits(self) -> c_uint {
        self.0
    }

    pub fn contains(self, other: CredentialType) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A native credential. Ownership moves to native code when it is returned
/// from a credentials callback; otherwise it is freed on drop.
#[derive(Debug)]
pub struct Credential {
    lib: &'static NativeLibrary,
    raw: *mut git_credential,
}

impl Credential {
    fn into_raw(self) -> *mut git_credential {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { (self.lib.credential_free)(self.raw) }
        }
    }
}

/// What the transport is asking credentials for.
#[derive(Debug)]
pub struct CredentialRequest<'a> {
    lib: &'static NativeLibrary,
    pub url: &'a str,
    pub username_from_url: Option<&'a str>,
    pub allowed: CredentialType,
}

impl CredentialRequest<'_> {
    pub fn userpass_plaintext(&self, username: &str, password: &str) -> Result<Credential, Error> {
        let username = util::to_cstring(username)?;
        let password = util::to_cstring(password)?;
        let mut out = ptr::null_mut();
        self.lib.check(unsafe {
            (self.lib.credential_userpass_plaintext_new)(&mut out, username.as_ptr(), password.as_ptr())
        })?;
        Ok(Credential { lib: self.lib, raw: out })
    }

    pub fn default_credential(&self) -> Result<Credential, Error> {
        let mut out = ptr::null_mut();
        self.lib.check(unsafe { (self.lib.credential_default_new)(&mut out) })?;
        Ok(Credential { lib: self.lib, raw: out })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertType {
    None,
    X509,
    HostkeyLibssh2,
    StrArray,
    Other(c_int),
}

/// A server certificate borrowed for one certificate-check callback.
#[derive(Debug)]
pub struct Cert<'a> {
    raw: *mut git_cert,
    _marker: PhantomData<&'a git_cert>,
}

impl Cert<'_> {
    pub fn cert_type(&self) -> CertType {
        if self.raw.is_null() {
            return CertType::None;
        }
        match unsafe { (*self.raw).cert_type } {
            raw::GIT_CERT_NONE => CertType::None,
            raw::GIT_CERT_X509 => CertType::X509,
            raw::GIT_CERT_HOSTKEY_LIBSSH2 => CertType::HostkeyLibssh2,
            raw::GIT_CERT_STRARRAY => CertType::StrArray,
            other => CertType::Other(other),
        }
    }

    pub fn raw(&self) -> *mut git_cert {
        self.raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateCheckStatus {
    Accept,
    /// Defer to the transport's own verification.
    Passthrough,
}

/// Transfer statistics reported while objects are received or indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total_objects: usize,
    pub indexed_objects: usize,
    pub received_objects: usize,
    pub local_objects: usize,
    pub total_deltas: usize,
    pub indexed_deltas: usize,
    pub received_bytes: usize,
}

impl From<&git_indexer_progress> for Progress {
    fn from(raw: &git_indexer_progress) -> Progress {
        Progress {
            total_objects: raw.total_objects as usize,
            indexed_objects: raw.indexed_objects as usize,
            received_objects: raw.received_objects as usize,
            local_objects: raw.local_objects as usize,
            total_deltas: raw.total_deltas as usize,
            indexed_deltas: raw.indexed_deltas as usize,
            received_bytes: raw.received_bytes,
        }
    }
}

/// Phase a remote operation reports as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCompletion {
    Download,
    Indexing,
    Error,
    Other(c_int),
}

impl RemoteCompletion {
    fn from_raw(raw: git_remote_completion_t) -> RemoteCompletion {
        match raw {
            raw::GIT_REMOTE_COMPLETION_DOWNLOAD => RemoteCompletion::Download,
            raw::GIT_REMOTE_COMPLETION_INDEXING => RemoteCompletion::Indexing,
            raw::GIT_REMOTE_COMPLETION_ERROR => RemoteCompletion::Error,
            other => RemoteCompletion::Other(other),
        }
    }
}

/// Stage of pack building while a push prepares its pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackBuilderStage {
    AddingObjects,
    Deltafication,
    Other(c_int),
}

impl PackBuilderStage {
    fn from_raw(raw: c_int) -> PackBuilderStage {
        match raw {
            raw::GIT_PACKBUILDER_ADDING_OBJECTS => PackBuilderStage::AddingObjects,
            raw::GIT_PACKBUILDER_DELTAFICATION => PackBuilderStage::Deltafication,
            other => PackBuilderStage::Other(other),
        }
    }
}

type CredentialsCb = dyn FnMut(&CredentialRequest<'_>) -> Result<Credential, CallbackError> + Send;
type TransferProgressCb = dyn FnMut(Progress) -> Result<(), CallbackError> + Send;
type CertificateCheckCb =
    dyn FnMut(&Cert<'_>, bool, &str) -> Result<CertificateCheckStatus, CallbackError> + Send;
type PushUpdateReferenceCb = dyn FnMut(&str, Option<&str>) -> Result<(), CallbackError> + Send;
type SidebandProgressCb = dyn FnMut(&[u8]) -> Result<(), CallbackError> + Send;
type UpdateTipsCb = dyn FnMut(&str, Oid, Oid) -> Result<(), CallbackError> + Send;
type CompletionCb = dyn FnMut(RemoteCompletion) -> Result<(), CallbackError> + Send;
type PackProgressCb = dyn FnMut(PackBuilderStage, u32, u32) -> Result<(), CallbackError> + Send;
type PushTransferProgressCb = dyn FnMut(usize, usize, usize) -> Result<(), CallbackError> + Send;

/// Callbacks a [`Remote`] hands to every network operation.
#[derive(Default)]
pub struct RemoteCallbacks {
    credentials: Option<Box<CredentialsCb>>,
    transfer_progress: Option<Box<TransferProgressCb>>,
    certificate_check: Option<Box<CertificateCheckCb>>,
    push_update_reference: Option<Box<PushUpdateReferenceCb>>,
    sideband_progress: Option<Box<SidebandProgressCb>>,
    update_tips: Option<Box<UpdateTipsCb>>,
    completion: Option<Box<CompletionCb>>,
    pack_progress: Option<Box<PackProgressCb>>,
    push_transfer_progress: Option<Box<PushTransferProgressCb>>,
}

impl RemoteCallbacks {
    pub fn new() -> RemoteCallbacks {
        RemoteCallbacks::default()
    }

    pub fn credentials<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(&CredentialRequest<'_>) -> Result<Credential, CallbackError> + Send + 'static,
    {
        self.credentials = Some(Box::new(cb));
        self
    }

    pub fn transfer_progress<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(Progress) -> Result<(), CallbackError> + Send + 'static,
    {
        self.transfer_progress = Some(Box::new(cb));
        self
    }

    pub fn certificate_check<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(&Cert<'_>, bool, &str) -> Result<CertificateCheckStatus, CallbackError> + Send + 'static,
    {
        self.certificate_check = Some(Box::new(cb));
        self
    }

    pub fn push_update_reference<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(&str, Option<&str>) -> Result<(), CallbackError> + Send + 'static,
    {
        self.push_update_reference = Some(Box::new(cb));
        self
    }

    pub fn sideband_progress<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(&[u8]) -> Result<(), CallbackError> + Send + 'static,
    {
        self.sideband_progress = Some(Box::new(cb));
        self
    }

    pub fn update_tips<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(&str, Oid, Oid) -> Result<(), CallbackError> + Send + 'static,
    {
        self.update_tips = Some(Box::new(cb));
        self
    }

    pub fn completion<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(RemoteCompletion) -> Result<(), CallbackError> + Send + 'static,
    {
        self.completion = Some(Box::new(cb));
        self
    }

    /// Called while a push builds its pack: stage, objects done, objects total.
    pub fn pack_progress<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(PackBuilderStage, u32, u32) -> Result<(), CallbackError> + Send + 'static,
    {
        self.pack_progress = Some(Box::new(cb));
        self
    }

    /// Called while a push uploads its pack: objects sent, objects total,
    /// bytes sent.
    pub fn push_transfer_progress<F>(&mut self, cb: F) -> &mut RemoteCallbacks
    where
        F: FnMut(usize, usize, usize) -> Result<(), CallbackError> + Send + 'static,
    {
        self.push_transfer_progress = Some(Box::new(cb));
        self
    }

    /// Points the slots of an initialized native table at the trampolines of
    /// the callbacks that are set. Other slots keep their defaults.
    fn fill(&self, raw: &mut git_remote_callbacks, payload: *mut c_void) {
        if self.sideband_progress.is_some() {
            raw.sideband_progress = Some(sideband_progress_cb);
        }
        if self.completion.is_some() {
            raw.completion = Some(completion_cb);
        }
        if self.credentials.is_some() {
            raw.credentials = Some(credentials_cb);
        }
        if self.certificate_check.is_some() {
            raw.certificate_check = Some(certificate_check_cb);
        }
        if self.transfer_progress.is_some() {
            raw.transfer_progress = Some(transfer_progress_cb);
        }
        if self.update_tips.is_some() {
            raw.update_tips = Some(update_tips_cb);
        }
        if self.pack_progress.is_some() {
            raw.pack_progress = Some(pack_progress_cb);
        }
        if self.push_transfer_progress.is_some() {
            raw.push_transfer_progress = Some(push_transfer_progress_cb);
        }
        if self.push_update_reference.is_some() {
            raw.push_update_reference = Some(push_update_reference_cb);
        }
        raw.payload = payload;
    }
}

/// An owned native remote with its callbacks attached for its whole life.
pub struct Remote {
    lib: &'static NativeLibrary,
    raw: *mut git_remote,
    attachment: Attachment<RemoteCallbacks>,
}

impl Remote {
    /// Takes ownership of `raw`; it is freed with `remote_free` on drop.
    ///
    /// # Safety
    ///
    /// `raw` must be a valid remote of `lib` not owned by anything else.
    pub unsafe fn from_raw(lib: &'static NativeLibrary, raw: *mut git_remote, callbacks: RemoteCallbacks) -> Remote {
        Remote {
            lib,
            raw,
            attachment: Attachment::new(lib, CallbackKind::Remote, callbacks),
        }
    }

    pub fn raw(&self) -> *mut git_remote {
        self.raw
    }

    fn fill_callbacks(&self, raw: &mut git_remote_callbacks) {
        let payload = self.attachment.handle().as_payload();
        self.attachment.with(|cbs| cbs.fill(raw, payload));
    }

    /// Opens a connection without transferring anything. The default proxy
    /// settings and no extra HTTP headers are used.
    pub fn connect(&mut self, direction: Direction) -> Result<(), Error> {
        let mut callbacks = unsafe {
            self.lib
                .init_options(self.lib.remote_init_callbacks, raw::GIT_REMOTE_CALLBACKS_VERSION)?
        };
        self.fill_callbacks(&mut callbacks);
        let direction = match direction {
            Direction::Fetch => raw::GIT_DIRECTION_FETCH,
            Direction::Push => raw::GIT_DIRECTION_PUSH,
        };
        self.lib
            .check(unsafe {
                (self.lib.remote_connect)(self.raw, direction, &callbacks, ptr::null(), ptr::null())
            })
            .map(drop)
    }

    /// Fetches `refspecs`, or the configured refspecs when empty.
    pub fn fetch(&mut self, refspecs: &[&str]) -> Result<(), Error> {
        let specs = StrArray::new(refspecs)?;
        let mut opts = unsafe {
            self.lib
                .init_options(self.lib.fetch_options_init, raw::GIT_FETCH_OPTIONS_VERSION)?
        };
        self.fill_callbacks(&mut opts.callbacks);
        self.lib
            .check(unsafe { (self.lib.remote_fetch)(self.raw, &specs.raw(), &opts, ptr::null()) })
            .map(drop)
    }

    pub fn push(&mut self, refspecs: &[&str]) -> Result<(), Error> {
        let specs = StrArray::new(refspecs)?;
        let mut opts = unsafe {
            self.lib
                .init_options(self.lib.push_options_init, raw::GIT_PUSH_OPTIONS_VERSION)?
        };
        self.fill_callbacks(&mut opts.callbacks);
        self.lib
            .check(unsafe { (self.lib.remote_push)(self.raw, &specs.raw(), &opts) })
            .map(drop)
    }
}

impl Drop for Remote {
    fn drop(&mut self) {
        unsafe { (self.lib.remote_free)(self.raw) }
    }
}

unsafe extern "C" fn credentials_cb(
    out: *mut *mut git_credential,
    url: *const c_char,
    username_from_url: *const c_char,
    allowed_types: c_uint,
    payload: *mut c_void,
) -> c_int {
    attached::dispatch::<RemoteCallbacks>(payload, CallbackKind::Remote, |lib, cbs, capture| {
        let Some(cb) = cbs.credentials.as_mut() else {
            return raw::GIT_PASSTHROUGH;
        };
        let url = util::lossy(url);
        let request = CredentialRequest {
            lib,
            url: &url,
            username_from_url: util::opt_str(username_from_url),
            allowed: CredentialType::from_bits(allowed_types),
        };
        attached::status(capture, cb(&request), |cred| {
            if out.is_null() {
                return raw::GIT_ERROR;
            }
            *out = cred.into_raw();
            0
        })
    })
}

unsafe extern "C" fn transfer_progress_cb(stats: *const git_indexer_progress, payload: *mut c_void) -> c_int {
    attached::dispatch::<RemoteCallbacks>(payload, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.transfer_progress.as_mut() else {
            return 0;
        };
        let progress = stats.as_ref().map(Progress::from).unwrap_or_default();
        attached::status(capture, cb(progress), |()| 0)
    })
}

unsafe extern "C" fn certificate_check_cb(
    cert: *mut git_cert,
    valid: c_int,
    host: *const c_char,
    payload: *mut c_void,
) -> c_int {
    attached::dispatch::<RemoteCallbacks>(payload, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.certificate_check.as_mut() else {
            return raw::GIT_PASSTHROUGH;
        };
        let cert = Cert {
            raw: cert,
            _marker: PhantomData,
        };
        let host = util::lossy(host);
        attached::status(capture, cb(&cert, valid != 0, &host), |status| match status {
            CertificateCheckStatus::Accept => 0,
            CertificateCheckStatus::Passthrough => raw::GIT_PASSTHROUGH,
        })
    })
}

unsafe extern "C" fn push_update_reference_cb(
    refname: *const c_char,
    status: *const c_char,
    data: *mut c_void,
) -> c_int {
    attached::dispatch::<RemoteCallbacks>(data, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.push_update_reference.as_mut() else {
            return 0;
        };
        let refname = util::lossy(refname);
        attached::status(capture, cb(&refname, util::opt_str(status)), |()| 0)
    })
}

unsafe extern "C" fn sideband_progress_cb(text: *const c_char, len: c_int, payload: *mut c_void) -> c_int {
    attached::dispatch::<RemoteCallbacks>(payload, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.sideband_progress.as_mut() else {
            return 0;
        };
        let text: &[u8] = if text.is_null() || len <= 0 {
            &[]
        } else {
            std::slice::from_raw_parts(text.cast::<u8>(), len as usize)
        };
        attached::status(capture, cb(text), |()| 0)
    })
}

unsafe extern "C" fn update_tips_cb(
    refname: *const c_char,
    a: *const git_oid,
    b: *const git_oid,
    data: *mut c_void,
) -> c_int {
    attached::dispatch::<RemoteCallbacks>(data, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.update_tips.as_mut() else {
            return 0;
        };
        let refname = util::lossy(refname);
        attached::status(capture, cb(&refname, Oid::from_raw(a), Oid::from_raw(b)), |()| 0)
    })
}

unsafe extern "C" fn completion_cb(completion: git_remote_completion_t, payload: *mut c_void) -> c_int {
    attached::dispatch::<RemoteCallbacks>(payload, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.completion.as_mut() else {
            return 0;
        };
        attached::status(capture, cb(RemoteCompletion::from_raw(completion)), |()| 0)
    })
}

unsafe extern "C" fn pack_progress_cb(stage: c_int, current: u32, total: u32, payload: *mut c_void) -> c_int {
    attached::dispatch::<RemoteCallbacks>(payload, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.pack_progress.as_mut() else {
            return 0;
        };
        attached::status(capture, cb(PackBuilderStage::from_raw(stage), current, total), |()| 0)
    })
}

unsafe extern "C" fn push_transfer_progress_cb(
    current: c_uint,
    total: c_uint,
    bytes: libc::size_t,
    payload: *mut c_void,
) -> c_int {
    attached::dispatch::<RemoteCallbacks>(payload, CallbackKind::Remote, |_, cbs, capture| {
        let Some(cb) = cbs.push_transfer_progress.as_mut() else {
            return 0;
        };
        attached::status(capture, cb(current as usize, total as usize, bytes), |()| 0)
    })
}
