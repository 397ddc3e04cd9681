//! C-layout types, constants and callback signatures shared with the native
//! library.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uint, c_void};

use libc::size_t;

pub const GIT_OK: c_int = 0;
pub const GIT_ERROR: c_int = -1;
pub const GIT_ENOTFOUND: c_int = -3;
pub const GIT_EEXISTS: c_int = -4;
/// Reserved for failures raised by user callbacks.
pub const GIT_EUSER: c_int = -7;
pub const GIT_PASSTHROUGH: c_int = -30;
pub const GIT_ITEROVER: c_int = -31;

pub const GIT_ERROR_NONE: c_int = 0;
pub const GIT_ERROR_NOMEMORY: c_int = 1;
pub const GIT_ERROR_OS: c_int = 2;
pub const GIT_ERROR_INVALID: c_int = 3;
pub const GIT_ERROR_REFERENCE: c_int = 4;
pub const GIT_ERROR_ODB: c_int = 9;
pub const GIT_ERROR_INDEX: c_int = 10;
pub const GIT_ERROR_NET: c_int = 12;
pub const GIT_ERROR_TREE: c_int = 14;
pub const GIT_ERROR_SSL: c_int = 16;
pub const GIT_ERROR_SUBMODULE: c_int = 17;
pub const GIT_ERROR_CALLBACK: c_int = 26;
pub const GIT_ERROR_REBASE: c_int = 29;

pub const GIT_TREEWALK_PRE: c_int = 0;
pub const GIT_TREEWALK_POST: c_int = 1;

pub const GIT_DIRECTION_FETCH: c_int = 0;
pub const GIT_DIRECTION_PUSH: c_int = 1;

pub const GIT_INDEX_ADD_DEFAULT: c_uint = 0;
pub const GIT_INDEX_ADD_FORCE: c_uint = 1 << 0;
pub const GIT_INDEX_ADD_DISABLE_PATHSPEC_MATCH: c_uint = 1 << 1;
pub const GIT_INDEX_ADD_CHECK_PATHSPEC: c_uint = 1 << 2;

pub const GIT_CREDENTIAL_USERPASS_PLAINTEXT: c_uint = 1 << 0;
pub const GIT_CREDENTIAL_SSH_KEY: c_uint = 1 << 1;
pub const GIT_CREDENTIAL_SSH_CUSTOM: c_uint = 1 << 2;
pub const GIT_CREDENTIAL_DEFAULT: c_uint = 1 << 3;
pub const GIT_CREDENTIAL_SSH_INTERACTIVE: c_uint = 1 << 4;
pub const GIT_CREDENTIAL_USERNAME: c_uint = 1 << 5;
pub const GIT_CREDENTIAL_SSH_MEMORY: c_uint = 1 << 6;

pub const GIT_CERT_NONE: c_int = 0;
pub const GIT_CERT_X509: c_int = 1;
pub const GIT_CERT_HOSTKEY_LIBSSH2: c_int = 2;
pub const GIT_CERT_STRARRAY: c_int = 3;

pub const GIT_DELTA_UNMODIFIED: c_int = 0;
pub const GIT_DELTA_ADDED: c_int = 1;
pub const GIT_DELTA_DELETED: c_int = 2;
pub const GIT_DELTA_MODIFIED: c_int = 3;
pub const GIT_DELTA_RENAMED: c_int = 4;
pub const GIT_DELTA_COPIED: c_int = 5;
pub const GIT_DELTA_IGNORED: c_int = 6;
pub const GIT_DELTA_UNTRACKED: c_int = 7;
pub const GIT_DELTA_TYPECHANGE: c_int = 8;
pub const GIT_DELTA_UNREADABLE: c_int = 9;
pub const GIT_DELTA_CONFLICTED: c_int = 10;

pub const GIT_OID_RAWSZ: usize = 20;
pub const GIT_REMOTE_CALLBACKS_VERSION: c_uint = 1;
pub const GIT_PROXY_OPTIONS_VERSION: c_uint = 1;
pub const GIT_FETCH_OPTIONS_VERSION: c_uint = 1;
pub const GIT_PUSH_OPTIONS_VERSION: c_uint = 1;
pub const GIT_MERGE_OPTIONS_VERSION: c_uint = 1;
pub const GIT_CHECKOUT_OPTIONS_VERSION: c_uint = 1;
pub const GIT_REBASE_OPTIONS_VERSION: c_uint = 1;

pub const GIT_REMOTE_COMPLETION_DOWNLOAD: c_int = 0;
pub const GIT_REMOTE_COMPLETION_INDEXING: c_int = 1;
pub const GIT_REMOTE_COMPLETION_ERROR: c_int = 2;

pub const GIT_PACKBUILDER_ADDING_OBJECTS: c_int = 0;
pub const GIT_PACKBUILDER_DELTAFICATION: c_int = 1;

pub type git_remote_completion_t = c_int;
pub type git_proxy_t = c_int;
pub type git_fetch_prune_t = c_int;
pub type git_remote_autotag_option_t = c_int;
pub type git_remote_redirect_t = c_int;
pub type git_merge_file_favor_t = c_int;

pub enum git_tree {}
pub enum git_tree_entry {}
pub enum git_diff {}
pub enum git_diff_binary {}
pub enum git_odb {}
pub enum git_packbuilder {}
pub enum git_repository {}
pub enum git_submodule {}
pub enum git_index {}
pub enum git_commit {}
pub enum git_rebase {}
pub enum git_remote {}
pub enum git_credential {}
pub enum git_transport {}
pub enum git_push_update {}
pub enum git_diff_similarity_metric {}
pub enum git_checkout_perfdata {}

#[repr(C)]
pub struct git_error {
    pub message: *mut c_char,
    pub klass: c_int,
}

#[repr(C)]
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct git_oid {
    pub id: [u8; GIT_OID_RAWSZ],
}

#[repr(C)]
pub struct git_strarray {
    pub strings: *mut *mut c_char,
    pub count: size_t,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct git_time {
    pub time: i64,
    pub offset: c_int,
    pub sign: c_char,
}

#[repr(C)]
pub struct git_signature {
    pub name: *mut c_char,
    pub email: *mut c_char,
    pub when: git_time,
}

#[repr(C)]
pub struct git_buf {
    pub ptr: *mut c_char,
    pub reserved: size_t,
    pub size: size_t,
}

#[repr(C)]
pub struct git_cert {
    pub cert_type: c_int,
}

#[repr(C)]
pub struct git_diff_file {
    pub id: git_oid,
    pub path: *const c_char,
    pub size: u64,
    pub flags: u32,
    pub mode: u16,
    pub id_abbrev: u16,
}

#[repr(C)]
pub struct git_diff_delta {
    pub status: c_int,
    pub flags: u32,
    pub similarity: u16,
    pub nfiles: u16,
    pub old_file: git_diff_file,
    pub new_file: git_diff_file,
}

#[repr(C)]
pub struct git_diff_hunk {
    pub old_start: c_int,
    pub old_lines: c_int,
    pub new_start: c_int,
    pub new_lines: c_int,
    pub header_len: size_t,
    pub header: [c_char; 128],
}

#[repr(C)]
pub struct git_diff_line {
    pub origin: c_char,
    pub old_lineno: c_int,
    pub new_lineno: c_int,
    pub num_lines: c_int,
    pub content_len: size_t,
    pub content_offset: i64,
    pub content: *const c_char,
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct git_indexer_progress {
    pub total_objects: c_uint,
    pub indexed_objects: c_uint,
    pub received_objects: c_uint,
    pub local_objects: c_uint,
    pub total_deltas: c_uint,
    pub indexed_deltas: c_uint,
    pub received_bytes: size_t,
}

pub type git_treewalk_cb = Option<
    unsafe extern "C" fn(root: *const c_char, entry: *const git_tree_entry, payload: *mut c_void) -> c_int,
>;
pub type git_diff_file_cb =
    Option<unsafe extern "C" fn(delta: *const git_diff_delta, progress: f32, payload: *mut c_void) -> c_int>;
pub type git_diff_binary_cb = Option<
    unsafe extern "C" fn(
        delta: *const git_diff_delta,
        binary: *const git_diff_binary,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_diff_hunk_cb = Option<
    unsafe extern "C" fn(
        delta: *const git_diff_delta,
        hunk: *const git_diff_hunk,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_diff_line_cb = Option<
    unsafe extern "C" fn(
        delta: *const git_diff_delta,
        hunk: *const git_diff_hunk,
        line: *const git_diff_line,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_packbuilder_foreach_cb =
    Option<unsafe extern "C" fn(buf: *mut c_void, size: size_t, payload: *mut c_void) -> c_int>;
pub type git_odb_foreach_cb = Option<unsafe extern "C" fn(id: *const git_oid, payload: *mut c_void) -> c_int>;
pub type git_submodule_cb = Option<
    unsafe extern "C" fn(sm: *mut git_submodule, name: *const c_char, payload: *mut c_void) -> c_int,
>;
pub type git_index_matched_path_cb = Option<
    unsafe extern "C" fn(path: *const c_char, matched_pathspec: *const c_char, payload: *mut c_void) -> c_int,
>;
pub type git_commit_create_cb = Option<
    unsafe extern "C" fn(
        out: *mut git_oid,
        author: *const git_signature,
        committer: *const git_signature,
        message_encoding: *const c_char,
        message: *const c_char,
        tree: *const git_tree,
        parent_count: size_t,
        parents: *const *const git_commit,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_credential_acquire_cb = Option<
    unsafe extern "C" fn(
        out: *mut *mut git_credential,
        url: *const c_char,
        username_from_url: *const c_char,
        allowed_types: c_uint,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_indexer_progress_cb =
    Option<unsafe extern "C" fn(stats: *const git_indexer_progress, payload: *mut c_void) -> c_int>;
pub type git_transport_certificate_check_cb = Option<
    unsafe extern "C" fn(cert: *mut git_cert, valid: c_int, host: *const c_char, payload: *mut c_void) -> c_int,
>;
pub type git_push_update_reference_cb = Option<
    unsafe extern "C" fn(refname: *const c_char, status: *const c_char, data: *mut c_void) -> c_int,
>;
pub type git_transport_message_cb =
    Option<unsafe extern "C" fn(str: *const c_char, len: c_int, payload: *mut c_void) -> c_int>;
pub type git_update_tips_cb = Option<
    unsafe extern "C" fn(
        refname: *const c_char,
        a: *const git_oid,
        b: *const git_oid,
        data: *mut c_void,
    ) -> c_int,
>;

pub type git_packbuilder_progress = Option<
    unsafe extern "C" fn(stage: c_int, current: u32, total: u32, payload: *mut c_void) -> c_int,
>;
pub type git_push_transfer_progress_cb = Option<
    unsafe extern "C" fn(current: c_uint, total: c_uint, bytes: size_t, payload: *mut c_void) -> c_int,
>;
pub type git_push_negotiation = Option<
    unsafe extern "C" fn(updates: *mut *const git_push_update, len: size_t, payload: *mut c_void) -> c_int,
>;
pub type git_transport_cb =
    Option<unsafe extern "C" fn(out: *mut *mut git_transport, owner: *mut git_remote, param: *mut c_void) -> c_int>;
pub type git_remote_ready_cb =
    Option<unsafe extern "C" fn(remote: *mut git_remote, direction: c_int, payload: *mut c_void) -> c_int>;
pub type git_url_resolve_cb = Option<
    unsafe extern "C" fn(
        url_resolved: *mut git_buf,
        url: *const c_char,
        direction: c_int,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_remote_completion_cb =
    Option<unsafe extern "C" fn(completion: git_remote_completion_t, payload: *mut c_void) -> c_int>;
pub type git_commit_signing_cb = Option<
    unsafe extern "C" fn(
        signature: *mut git_buf,
        signature_field: *mut git_buf,
        commit_content: *const c_char,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_checkout_notify_cb = Option<
    unsafe extern "C" fn(
        why: c_uint,
        path: *const c_char,
        baseline: *const git_diff_file,
        target: *const git_diff_file,
        workdir: *const git_diff_file,
        payload: *mut c_void,
    ) -> c_int,
>;
pub type git_checkout_progress_cb = Option<
    unsafe extern "C" fn(path: *const c_char, completed_steps: size_t, total_steps: size_t, payload: *mut c_void),
>;
pub type git_checkout_perfdata_cb =
    Option<unsafe extern "C" fn(perfdata: *const git_checkout_perfdata, payload: *mut c_void)>;

// The option structs below follow the libgit2 1.7 ABI field for field. Build
// them zeroed and run the library's own `*_init` function over them before
// filling in callbacks.

/// Callback table handed to every remote operation.
#[repr(C)]
pub struct git_remote_callbacks {
    pub version: c_uint,
    pub sideband_progress: git_transport_message_cb,
    pub completion: git_remote_completion_cb,
    pub credentials: git_credential_acquire_cb,
    pub certificate_check: git_transport_certificate_check_cb,
    pub transfer_progress: git_indexer_progress_cb,
    pub update_tips: git_update_tips_cb,
    pub pack_progress: git_packbuilder_progress,
    pub push_transfer_progress: git_push_transfer_progress_cb,
    pub push_update_reference: git_push_update_reference_cb,
    pub push_negotiation: git_push_negotiation,
    pub transport: git_transport_cb,
    pub remote_ready: git_remote_ready_cb,
    pub payload: *mut c_void,
    pub resolve_url: git_url_resolve_cb,
}

#[repr(C)]
pub struct git_proxy_options {
    pub version: c_uint,
    pub kind: git_proxy_t,
    pub url: *const c_char,
    pub credentials: git_credential_acquire_cb,
    pub certificate_check: git_transport_certificate_check_cb,
    pub payload: *mut c_void,
}

#[repr(C)]
pub struct git_fetch_options {
    pub version: c_int,
    pub callbacks: git_remote_callbacks,
    pub prune: git_fetch_prune_t,
    pub update_fetchhead: c_int,
    pub download_tags: git_remote_autotag_option_t,
    pub proxy_opts: git_proxy_options,
    pub depth: c_int,
    pub follow_redirects: git_remote_redirect_t,
    pub custom_headers: git_strarray,
}

#[repr(C)]
pub struct git_push_options {
    pub version: c_uint,
    pub pb_parallelism: c_uint,
    pub callbacks: git_remote_callbacks,
    pub proxy_opts: git_proxy_options,
    pub follow_redirects: git_remote_redirect_t,
    pub custom_headers: git_strarray,
}

#[repr(C)]
pub struct git_merge_options {
    pub version: c_uint,
    pub flags: u32,
    pub rename_threshold: c_uint,
    pub target_limit: c_uint,
    pub metric: *mut git_diff_similarity_metric,
    pub recursion_limit: c_uint,
    pub default_driver: *const c_char,
    pub file_favor: git_merge_file_favor_t,
    pub file_flags: u32,
}

#[repr(C)]
pub struct git_checkout_options {
    pub version: c_uint,
    pub checkout_strategy: c_uint,
    pub disable_filters: c_int,
    pub dir_mode: c_uint,
    pub file_mode: c_uint,
    pub file_open_flags: c_int,
    pub notify_flags: c_uint,
    pub notify_cb: git_checkout_notify_cb,
    pub notify_payload: *mut c_void,
    pub progress_cb: git_checkout_progress_cb,
    pub progress_payload: *mut c_void,
    pub paths: git_strarray,
    pub baseline: *mut git_tree,
    pub baseline_index: *mut git_index,
    pub target_directory: *const c_char,
    pub ancestor_label: *const c_char,
    pub our_label: *const c_char,
    pub their_label: *const c_char,
    pub perfdata_cb: git_checkout_perfdata_cb,
    pub perfdata_payload: *mut c_void,
}

#[repr(C)]
pub struct git_rebase_options {
    pub version: c_uint,
    pub quiet: c_int,
    pub inmemory: c_int,
    pub rewrite_notes_ref: *const c_char,
    pub merge_options: git_merge_options,
    pub checkout_options: git_checkout_options,
    pub commit_create_cb: git_commit_create_cb,
    pub signing_cb: git_commit_signing_cb,
    pub payload: *mut c_void,
}
