//! An in-process stand-in for the native library: enough behaviour behind
//! each `NativeLibrary` slot to drive every trampoline the way libgit2 does.

#![allow(dead_code)]

use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use std::sync::OnceLock;

use git2_alloc_trace::AllocatorVTable;
use git2_bridge::raw::*;
use git2_bridge::{registry, Handle, NativeLibrary};

pub static FAKE: NativeLibrary = NativeLibrary {
    error_last: fake_error_last,
    error_set_str: fake_error_set_str,
    error_clear: fake_error_clear,
    tree_walk: fake_tree_walk,
    tree_entry_name: fake_tree_entry_name,
    tree_entry_id: fake_tree_entry_id,
    tree_entry_filemode: fake_tree_entry_filemode,
    diff_foreach: fake_diff_foreach,
    packbuilder_foreach: fake_packbuilder_foreach,
    odb_foreach: fake_odb_foreach,
    submodule_foreach: fake_submodule_foreach,
    index_add_all: fake_index_add_all,
    index_update_all: fake_index_update_all,
    index_remove_all: fake_index_remove_all,
    rebase_options_init: fake_rebase_options_init,
    rebase_init: fake_rebase_init,
    rebase_commit: fake_rebase_commit,
    rebase_free: fake_rebase_free,
    remote_init_callbacks: fake_remote_init_callbacks,
    fetch_options_init: fake_fetch_options_init,
    push_options_init: fake_push_options_init,
    remote_connect: fake_remote_connect,
    remote_fetch: fake_remote_fetch,
    remote_push: fake_remote_push,
    remote_free: fake_remote_free,
    credential_userpass_plaintext_new: fake_credential_userpass_plaintext_new,
    credential_default_new: fake_credential_default_new,
    credential_free: fake_credential_free,
    stdalloc_init_allocator: fake_stdalloc_init_allocator,
    set_allocator: fake_set_allocator,
};

pub fn lib() -> &'static NativeLibrary {
    &FAKE
}

/// [`FAKE`] with a `set_allocator` that refuses every vtable.
pub fn lib_rejecting_allocator() -> &'static NativeLibrary {
    static LIB: OnceLock<NativeLibrary> = OnceLock::new();
    LIB.get_or_init(|| NativeLibrary {
        set_allocator: fake_reject_allocator,
        ..FAKE
    })
}

// ---------------------------------------------------------------------------
// Error state
// ---------------------------------------------------------------------------

struct ErrorState {
    _message: CString,
    raw: git_error,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<Box<ErrorState>>> = const { RefCell::new(None) };
}

fn set_error(class: c_int, message: &str) {
    let message = CString::new(message.replace('\0', " ")).unwrap();
    let raw = git_error {
        message: message.as_ptr() as *mut c_char,
        klass: class,
    };
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(Box::new(ErrorState {
            _message: message,
            raw,
        }))
    });
}

fn has_error() -> bool {
    LAST_ERROR.with(|e| e.borrow().is_some())
}

/// Mirrors libgit2's handling of a non-zero callback return: keep whatever
/// error the callback set, otherwise record a generic one.
fn after_callback(rc: c_int, name: &str) -> c_int {
    if rc < 0 && !has_error() {
        set_error(GIT_ERROR_CALLBACK, &format!("{name} callback returned {rc}"));
    }
    rc
}

/// Rejects option structs that were not run through their initializer, the
/// way libgit2 checks the version field of every options argument.
fn check_version(what: &str, version: c_uint, expected: c_uint) -> Result<(), c_int> {
    if version == expected {
        return Ok(());
    }
    set_error(GIT_ERROR_INVALID, &format!("invalid version {version} on {what}"));
    Err(GIT_ERROR)
}

pub fn last_error_message() -> Option<String> {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| unsafe { CStr::from_ptr(s.raw.message) }.to_string_lossy().into_owned())
    })
}

unsafe extern "C" fn fake_error_last() -> *const git_error {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map_or(ptr::null(), |s| &s.raw as *const git_error)
    })
}

unsafe extern "C" fn fake_error_set_str(class: c_int, message: *const c_char) -> c_int {
    set_error(class, &CStr::from_ptr(message).to_string_lossy());
    0
}

unsafe extern "C" fn fake_error_clear() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

pub struct FakeEntry {
    pub name: CString,
    pub id: git_oid,
    pub mode: c_int,
    pub children: Vec<FakeEntry>,
}

impl FakeEntry {
    pub fn blob(name: &str, byte: u8) -> FakeEntry {
        FakeEntry {
            name: CString::new(name).unwrap(),
            id: git_oid { id: [byte; 20] },
            mode: 0o100644,
            children: Vec::new(),
        }
    }

    pub fn dir(name: &str, byte: u8, children: Vec<FakeEntry>) -> FakeEntry {
        FakeEntry {
            name: CString::new(name).unwrap(),
            id: git_oid { id: [byte; 20] },
            mode: 0o040000,
            children,
        }
    }
}

pub struct FakeTree {
    pub entries: Vec<FakeEntry>,
    pub corrupt: bool,
}

impl FakeTree {
    pub fn raw(&self) -> *const git_tree {
        self as *const FakeTree as *const git_tree
    }
}

/// `src/main.c`, `src/lib/util.c`, `README`, in that order.
pub fn sample_tree() -> FakeTree {
    FakeTree {
        entries: vec![
            FakeEntry::dir(
                "src",
                1,
                vec![
                    FakeEntry::blob("main.c", 2),
                    FakeEntry::dir("lib", 3, vec![FakeEntry::blob("util.c", 4)]),
                ],
            ),
            FakeEntry::blob("README", 5),
        ],
        corrupt: false,
    }
}

unsafe fn walk_entries(
    entries: &[FakeEntry],
    root: &str,
    mode: c_int,
    cb: unsafe extern "C" fn(*const c_char, *const git_tree_entry, *mut c_void) -> c_int,
    payload: *mut c_void,
) -> c_int {
    let root_c = CString::new(root).unwrap();
    for entry in entries {
        let raw = entry as *const FakeEntry as *const git_tree_entry;
        let mut skip = false;
        if mode == GIT_TREEWALK_PRE {
            let rc = cb(root_c.as_ptr(), raw, payload);
            if rc < 0 {
                return rc;
            }
            skip = rc > 0;
        }
        if !skip && !entry.children.is_empty() {
            let child_root = format!("{root}{}/", entry.name.to_str().unwrap());
            let rc = walk_entries(&entry.children, &child_root, mode, cb, payload);
            if rc < 0 {
                return rc;
            }
        }
        if mode == GIT_TREEWALK_POST {
            let rc = cb(root_c.as_ptr(), raw, payload);
            if rc < 0 {
                return rc;
            }
        }
    }
    0
}

unsafe extern "C" fn fake_tree_walk(
    tree: *const git_tree,
    mode: c_int,
    callback: git_treewalk_cb,
    payload: *mut c_void,
) -> c_int {
    fake_error_clear();
    let Some(cb) = callback else {
        set_error(GIT_ERROR_INVALID, "tree walk requires a callback");
        return GIT_ERROR;
    };
    let tree = &*(tree as *const FakeTree);
    if tree.corrupt {
        set_error(GIT_ERROR_TREE, "corrupt tree object");
        return GIT_ERROR;
    }
    after_callback(walk_entries(&tree.entries, "", mode, cb, payload), "tree walk")
}

unsafe extern "C" fn fake_tree_entry_name(entry: *const git_tree_entry) -> *const c_char {
    (*(entry as *const FakeEntry)).name.as_ptr()
}

unsafe extern "C" fn fake_tree_entry_id(entry: *const git_tree_entry) -> *const git_oid {
    &(*(entry as *const FakeEntry)).id
}

unsafe extern "C" fn fake_tree_entry_filemode(entry: *const git_tree_entry) -> c_int {
    (*(entry as *const FakeEntry)).mode
}

// ---------------------------------------------------------------------------
// Diffs
// ---------------------------------------------------------------------------

pub struct FakeLine {
    pub content: Vec<u8>,
    pub raw: git_diff_line,
}

pub struct FakeHunk {
    pub raw: git_diff_hunk,
    pub lines: Vec<FakeLine>,
}

pub struct FakeDelta {
    _old_path: CString,
    _new_path: CString,
    pub raw: git_diff_delta,
    pub hunks: Vec<FakeHunk>,
}

pub struct FakeDiff {
    pub deltas: Vec<FakeDelta>,
}

impl FakeDiff {
    pub fn raw(&mut self) -> *mut git_diff {
        self as *mut FakeDiff as *mut git_diff
    }
}

fn diff_file(path: &CString, byte: u8) -> git_diff_file {
    git_diff_file {
        id: git_oid { id: [byte; 20] },
        path: path.as_ptr(),
        size: 0,
        flags: 0,
        mode: 0o100644,
        id_abbrev: 7,
    }
}

fn hunk(header: &str, old_start: c_int, new_start: c_int, lines: Vec<FakeLine>) -> FakeHunk {
    let mut raw = git_diff_hunk {
        old_start,
        old_lines: 1,
        new_start,
        new_lines: 2,
        header_len: header.len(),
        header: [0; 128],
    };
    for (dst, src) in raw.header.iter_mut().zip(header.bytes()) {
        *dst = src as c_char;
    }
    FakeHunk { raw, lines }
}

fn line(origin: char, old_lineno: c_int, new_lineno: c_int, content: &str) -> FakeLine {
    let content = content.as_bytes().to_vec();
    let raw = git_diff_line {
        origin: origin as u8 as c_char,
        old_lineno,
        new_lineno,
        num_lines: 1,
        content_len: content.len(),
        content_offset: 0,
        content: content.as_ptr() as *const c_char,
    };
    FakeLine { content, raw }
}

/// One modified file with one hunk of three lines, and one added file with
/// no hunks.
pub fn sample_diff() -> FakeDiff {
    let old_a = CString::new("src/main.c").unwrap();
    let new_a = CString::new("src/main.c").unwrap();
    let old_b = CString::new("NEWS").unwrap();
    let new_b = CString::new("NEWS").unwrap();
    FakeDiff {
        deltas: vec![
            FakeDelta {
                raw: git_diff_delta {
                    status: GIT_DELTA_MODIFIED,
                    flags: 0,
                    similarity: 0,
                    nfiles: 2,
                    old_file: diff_file(&old_a, 1),
                    new_file: diff_file(&new_a, 2),
                },
                _old_path: old_a,
                _new_path: new_a,
                hunks: vec![hunk(
                    "@@ -1 +1,2 @@\n",
                    1,
                    1,
                    vec![
                        line(' ', 1, 1, "int main(void)\n"),
                        line('-', 2, -1, "{ return 1; }\n"),
                        line('+', -1, 2, "{ return 0; }\n"),
                    ],
                )],
            },
            FakeDelta {
                raw: git_diff_delta {
                    status: GIT_DELTA_ADDED,
                    flags: 0,
                    similarity: 0,
                    nfiles: 1,
                    old_file: diff_file(&old_b, 0),
                    new_file: diff_file(&new_b, 3),
                },
                _old_path: old_b,
                _new_path: new_b,
                hunks: Vec::new(),
            },
        ],
    }
}

unsafe extern "C" fn fake_diff_foreach(
    diff: *mut git_diff,
    file_cb: git_diff_file_cb,
    _binary_cb: git_diff_binary_cb,
    hunk_cb: git_diff_hunk_cb,
    line_cb: git_diff_line_cb,
    payload: *mut c_void,
) -> c_int {
    fake_error_clear();
    let diff = &*(diff as *const FakeDiff);
    let total = diff.deltas.len() as f32;
    for (i, delta) in diff.deltas.iter().enumerate() {
        if let Some(cb) = file_cb {
            let rc = cb(&delta.raw, i as f32 / total, payload);
            if rc != 0 {
                return after_callback(rc, "diff file");
            }
        }
        for hunk in &delta.hunks {
            if let Some(cb) = hunk_cb {
                let rc = cb(&delta.raw, &hunk.raw, payload);
                if rc != 0 {
                    return after_callback(rc, "diff hunk");
                }
            }
            for line in &hunk.lines {
                if let Some(cb) = line_cb {
                    let rc = cb(&delta.raw, &hunk.raw, &line.raw, payload);
                    if rc != 0 {
                        return after_callback(rc, "diff line");
                    }
                }
            }
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Pack builder, object database, submodules
// ---------------------------------------------------------------------------

pub struct FakePackBuilder {
    pub chunks: Vec<Vec<u8>>,
}

impl FakePackBuilder {
    pub fn raw(&mut self) -> *mut git_packbuilder {
        self as *mut FakePackBuilder as *mut git_packbuilder
    }
}

unsafe extern "C" fn fake_packbuilder_foreach(
    pb: *mut git_packbuilder,
    callback: git_packbuilder_foreach_cb,
    payload: *mut c_void,
) -> c_int {
    fake_error_clear();
    let pb = &mut *(pb as *mut FakePackBuilder);
    let Some(cb) = callback else { return GIT_ERROR };
    for chunk in &mut pb.chunks {
        let rc = cb(chunk.as_mut_ptr() as *mut c_void, chunk.len(), payload);
        if rc != 0 {
            return after_callback(rc, "packbuilder foreach");
        }
    }
    0
}

pub struct FakeOdb {
    pub ids: Vec<git_oid>,
    /// Payload to hand to the callback instead of the one the caller passed.
    pub payload_override: Option<usize>,
}

impl FakeOdb {
    pub fn new(bytes: impl IntoIterator<Item = u8>) -> FakeOdb {
        FakeOdb {
            ids: bytes.into_iter().map(|b| git_oid { id: [b; 20] }).collect(),
            payload_override: None,
        }
    }

    pub fn raw(&mut self) -> *mut git_odb {
        self as *mut FakeOdb as *mut git_odb
    }
}

unsafe extern "C" fn fake_odb_foreach(odb: *mut git_odb, callback: git_odb_foreach_cb, payload: *mut c_void) -> c_int {
    fake_error_clear();
    let odb = &*(odb as *const FakeOdb);
    let Some(cb) = callback else { return GIT_ERROR };
    let payload = odb.payload_override.map_or(payload, |p| p as *mut c_void);
    for id in &odb.ids {
        let rc = cb(id, payload);
        if rc != 0 {
            return after_callback(rc, "odb foreach");
        }
    }
    0
}

/// Repository stand-in: submodule names, plus the commits a rebase creates.
pub struct FakeRepo {
    pub submodules: Vec<CString>,
}

impl FakeRepo {
    pub fn new(submodules: &[&str]) -> FakeRepo {
        FakeRepo {
            submodules: submodules.iter().map(|s| CString::new(*s).unwrap()).collect(),
        }
    }

    pub fn raw(&mut self) -> *mut git_repository {
        self as *mut FakeRepo as *mut git_repository
    }
}

unsafe extern "C" fn fake_submodule_foreach(
    repo: *mut git_repository,
    callback: git_submodule_cb,
    payload: *mut c_void,
) -> c_int {
    fake_error_clear();
    let repo = &*(repo as *const FakeRepo);
    let Some(cb) = callback else { return GIT_ERROR };
    for (i, name) in repo.submodules.iter().enumerate() {
        let sm = (0x1000 + i * 0x10) as *mut git_submodule;
        let rc = cb(sm, name.as_ptr(), payload);
        if rc != 0 {
            return after_callback(rc, "submodule foreach");
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Working-tree paths and the set currently staged.
pub struct FakeIndex {
    pub worktree: Vec<String>,
    pub staged: Vec<String>,
    pub last_flags: c_uint,
}

impl FakeIndex {
    pub fn new(worktree: &[&str], staged: &[&str]) -> FakeIndex {
        FakeIndex {
            worktree: worktree.iter().map(|s| s.to_string()).collect(),
            staged: staged.iter().map(|s| s.to_string()).collect(),
            last_flags: 0,
        }
    }

    pub fn raw(&mut self) -> *mut git_index {
        self as *mut FakeIndex as *mut git_index
    }
}

unsafe fn pathspecs(specs: *const git_strarray) -> Vec<String> {
    if specs.is_null() {
        return Vec::new();
    }
    let specs = &*specs;
    (0..specs.count)
        .map(|i| CStr::from_ptr(*specs.strings.add(i)).to_string_lossy().into_owned())
        .collect()
}

fn matching_spec<'a>(specs: &'a [String], path: &str) -> Option<&'a str> {
    if specs.is_empty() {
        return Some("");
    }
    specs
        .iter()
        .find(|s| s.as_str() == "*" || path.starts_with(s.as_str()))
        .map(String::as_str)
}

/// Offers each candidate path to the callback and returns the ones it
/// applied, or the failing code.
unsafe fn offer(
    candidates: &[String],
    specs: &[String],
    callback: git_index_matched_path_cb,
    payload: *mut c_void,
) -> Result<Vec<String>, c_int> {
    let mut applied = Vec::new();
    for path in candidates {
        let Some(spec) = matching_spec(specs, path) else {
            continue;
        };
        if let Some(cb) = callback {
            let path_c = CString::new(path.as_str()).unwrap();
            let spec_c = CString::new(spec).unwrap();
            let rc = cb(path_c.as_ptr(), spec_c.as_ptr(), payload);
            if rc < 0 {
                return Err(after_callback(rc, "index matched path"));
            }
            if rc > 0 {
                continue;
            }
        }
        applied.push(path.clone());
    }
    Ok(applied)
}

unsafe extern "C" fn fake_index_add_all(
    index: *mut git_index,
    pathspec: *const git_strarray,
    flags: c_uint,
    callback: git_index_matched_path_cb,
    payload: *mut c_void,
) -> c_int {
    fake_error_clear();
    let index = &mut *(index as *mut FakeIndex);
    index.last_flags = flags;
    let specs = pathspecs(pathspec);
    match offer(&index.worktree.clone(), &specs, callback, payload) {
        Ok(applied) => {
            for path in applied {
                if !index.staged.contains(&path) {
                    index.staged.push(path);
                }
            }
            0
        }
        Err(rc) => rc,
    }
}

unsafe extern "C" fn fake_index_update_all(
    index: *mut git_index,
    pathspec: *const git_strarray,
    callback: git_index_matched_path_cb,
    payload: *mut c_void,
) -> c_int {
    fake_error_clear();
    let index = &mut *(index as *mut FakeIndex);
    let specs = pathspecs(pathspec);
    // Staged paths that vanished from the working tree are dropped.
    let gone: Vec<String> = index
        .staged
        .iter()
        .filter(|p| !index.worktree.contains(p))
        .cloned()
        .collect();
    match offer(&gone, &specs, callback, payload) {
        Ok(applied) => {
            index.staged.retain(|p| !applied.contains(p));
            0
        }
        Err(rc) => rc,
    }
}

unsafe extern "C" fn fake_index_remove_all(
    index: *mut git_index,
    pathspec: *const git_strarray,
    callback: git_index_matched_path_cb,
    payload: *mut c_void,
) -> c_int {
    fake_error_clear();
    let index = &mut *(index as *mut FakeIndex);
    let specs = pathspecs(pathspec);
    match offer(&index.staged.clone(), &specs, callback, payload) {
        Ok(applied) => {
            index.staged.retain(|p| !applied.contains(p));
            0
        }
        Err(rc) => rc,
    }
}

// ---------------------------------------------------------------------------
// Rebase
// ---------------------------------------------------------------------------

pub const NATIVE_COMMIT_ID: [u8; 20] = [0xab; 20];

pub static REBASE_FREED: AtomicUsize = AtomicUsize::new(0);
pub static REBASE_HANDLE_LIVE_AT_FREE: AtomicBool = AtomicBool::new(false);

struct FakeRebase {
    commit_create_cb: git_commit_create_cb,
    payload: *mut c_void,
}

unsafe extern "C" fn fake_rebase_options_init(opts: *mut git_rebase_options, version: c_uint) -> c_int {
    if let Err(rc) = check_version("git_rebase_options", version, GIT_REBASE_OPTIONS_VERSION) {
        return rc;
    }
    ptr::write_bytes(opts, 0, 1);
    let opts = &mut *opts;
    opts.version = version;
    opts.merge_options.version = GIT_MERGE_OPTIONS_VERSION;
    opts.checkout_options.version = GIT_CHECKOUT_OPTIONS_VERSION;
    opts.checkout_options.checkout_strategy = 1;
    0
}

unsafe extern "C" fn fake_rebase_init(
    out: *mut *mut git_rebase,
    _repo: *mut git_repository,
    opts: *const git_rebase_options,
) -> c_int {
    fake_error_clear();
    let (commit_create_cb, payload) = match opts.as_ref() {
        Some(o) => {
            let versions = check_version("git_rebase_options", o.version, GIT_REBASE_OPTIONS_VERSION).and_then(|()| {
                check_version(
                    "git_checkout_options",
                    o.checkout_options.version,
                    GIT_CHECKOUT_OPTIONS_VERSION,
                )
            });
            if let Err(rc) = versions {
                return rc;
            }
            (o.commit_create_cb, o.payload)
        }
        None => (None, ptr::null_mut()),
    };
    *out = Box::into_raw(Box::new(FakeRebase {
        commit_create_cb,
        payload,
    })) as *mut git_rebase;
    0
}

unsafe extern "C" fn fake_rebase_commit(
    id: *mut git_oid,
    rebase: *mut git_rebase,
    author: *const git_signature,
    committer: *const git_signature,
    message_encoding: *const c_char,
    message: *const c_char,
) -> c_int {
    fake_error_clear();
    let rebase = &*(rebase as *const FakeRebase);
    let original = CString::new("original message").unwrap();
    let message = if message.is_null() { original.as_ptr() } else { message };
    let author = if author.is_null() { committer } else { author };

    if let Some(cb) = rebase.commit_create_cb {
        let mut out = git_oid::default();
        let rc = cb(
            &mut out,
            author,
            committer,
            message_encoding,
            message,
            ptr::null(),
            0,
            ptr::null(),
            rebase.payload,
        );
        if rc == 0 {
            *id = out;
            return 0;
        }
        if rc != GIT_PASSTHROUGH {
            return after_callback(rc, "commit create");
        }
    }
    *id = git_oid { id: NATIVE_COMMIT_ID };
    0
}

unsafe extern "C" fn fake_rebase_free(rebase: *mut git_rebase) {
    let rebase = Box::from_raw(rebase as *mut FakeRebase);
    let live = Handle::from_payload(rebase.payload).is_some_and(|h| registry().lookup(h).is_ok());
    REBASE_HANDLE_LIVE_AT_FREE.store(live, Ordering::SeqCst);
    REBASE_FREED.fetch_add(1, Ordering::SeqCst);
}

// ---------------------------------------------------------------------------
// Remotes and credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCredential {
    UserPass { username: String, password: String },
    Default,
}

pub static CREDENTIALS_FREED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn fake_credential_userpass_plaintext_new(
    out: *mut *mut git_credential,
    username: *const c_char,
    password: *const c_char,
) -> c_int {
    let cred = FakeCredential::UserPass {
        username: CStr::from_ptr(username).to_string_lossy().into_owned(),
        password: CStr::from_ptr(password).to_string_lossy().into_owned(),
    };
    *out = Box::into_raw(Box::new(cred)) as *mut git_credential;
    0
}

unsafe extern "C" fn fake_credential_default_new(out: *mut *mut git_credential) -> c_int {
    *out = Box::into_raw(Box::new(FakeCredential::Default)) as *mut git_credential;
    0
}

unsafe extern "C" fn fake_credential_free(cred: *mut git_credential) {
    drop(Box::from_raw(cred as *mut FakeCredential));
    CREDENTIALS_FREED.fetch_add(1, Ordering::SeqCst);
}

/// Scripted server: what a connect, fetch or push reports to the callbacks.
pub struct FakeRemote {
    pub url: CString,
    pub username_from_url: Option<CString>,
    pub allowed_types: c_uint,
    pub cert_valid: bool,
    pub host: CString,
    pub sideband: Vec<Vec<u8>>,
    pub progress: Vec<git_indexer_progress>,
    pub tips: Vec<(CString, git_oid, git_oid)>,
    pub completions: Vec<c_int>,
    pub pack_stages: Vec<(c_int, u32, u32)>,
    pub push_progress: Vec<(c_uint, c_uint, usize)>,
    pub rejected: Vec<(String, String)>,

    pub credential: Option<FakeCredential>,
    pub connected: bool,
    pub pushed: Vec<String>,
    pub freed: bool,
    pub handle_live_at_free: bool,
    pub last_payload: *mut c_void,
}

impl FakeRemote {
    pub fn new(url: &str) -> FakeRemote {
        FakeRemote {
            url: CString::new(url).unwrap(),
            username_from_url: Some(CString::new("git").unwrap()),
            allowed_types: GIT_CREDENTIAL_USERPASS_PLAINTEXT | GIT_CREDENTIAL_DEFAULT,
            cert_valid: true,
            host: CString::new("example.com").unwrap(),
            sideband: Vec::new(),
            progress: Vec::new(),
            tips: Vec::new(),
            completions: Vec::new(),
            pack_stages: Vec::new(),
            push_progress: Vec::new(),
            rejected: Vec::new(),
            credential: None,
            connected: false,
            pushed: Vec::new(),
            freed: false,
            handle_live_at_free: false,
            last_payload: ptr::null_mut(),
        }
    }

    /// Leaks a heap copy for `Remote::from_raw`; read it back with
    /// [`remote_state`] and release it with [`reclaim_remote`].
    pub fn into_raw(self) -> *mut git_remote {
        Box::into_raw(Box::new(self)) as *mut git_remote
    }
}

pub unsafe fn remote_state<'a>(raw: *mut git_remote) -> &'a FakeRemote {
    &*(raw as *const FakeRemote)
}

pub unsafe fn reclaim_remote(raw: *mut git_remote) -> FakeRemote {
    *Box::from_raw(raw as *mut FakeRemote)
}

unsafe fn connect(remote: &mut FakeRemote, callbacks: &git_remote_callbacks) -> c_int {
    remote.last_payload = callbacks.payload;
    if let Some(cb) = callbacks.credentials {
        let mut cred: *mut git_credential = ptr::null_mut();
        let username = remote
            .username_from_url
            .as_ref()
            .map_or(ptr::null(), |u| u.as_ptr());
        let rc = cb(&mut cred, remote.url.as_ptr(), username, remote.allowed_types, callbacks.payload);
        if rc < 0 {
            return after_callback(rc, "credentials");
        }
        if rc == 0 && !cred.is_null() {
            let owned = Box::from_raw(cred as *mut FakeCredential);
            remote.credential = Some(*owned);
        }
    }

    let mut cert = git_cert {
        cert_type: GIT_CERT_X509,
    };
    let verdict = match callbacks.certificate_check {
        Some(cb) => cb(
            &mut cert,
            remote.cert_valid as c_int,
            remote.host.as_ptr(),
            callbacks.payload,
        ),
        None => GIT_PASSTHROUGH,
    };
    if verdict == GIT_PASSTHROUGH {
        if !remote.cert_valid {
            set_error(GIT_ERROR_SSL, "the SSL certificate is invalid");
            return GIT_ERROR;
        }
    } else if verdict < 0 {
        return after_callback(verdict, "certificate check");
    }
    remote.connected = true;
    0
}

unsafe extern "C" fn fake_remote_init_callbacks(callbacks: *mut git_remote_callbacks, version: c_uint) -> c_int {
    if let Err(rc) = check_version("git_remote_callbacks", version, GIT_REMOTE_CALLBACKS_VERSION) {
        return rc;
    }
    ptr::write_bytes(callbacks, 0, 1);
    (*callbacks).version = version;
    0
}

unsafe extern "C" fn fake_fetch_options_init(opts: *mut git_fetch_options, version: c_uint) -> c_int {
    if let Err(rc) = check_version("git_fetch_options", version, GIT_FETCH_OPTIONS_VERSION) {
        return rc;
    }
    ptr::write_bytes(opts, 0, 1);
    let opts = &mut *opts;
    opts.version = version as c_int;
    opts.callbacks.version = GIT_REMOTE_CALLBACKS_VERSION;
    opts.update_fetchhead = 1;
    opts.proxy_opts.version = GIT_PROXY_OPTIONS_VERSION;
    0
}

unsafe extern "C" fn fake_push_options_init(opts: *mut git_push_options, version: c_uint) -> c_int {
    if let Err(rc) = check_version("git_push_options", version, GIT_PUSH_OPTIONS_VERSION) {
        return rc;
    }
    ptr::write_bytes(opts, 0, 1);
    let opts = &mut *opts;
    opts.version = version;
    opts.pb_parallelism = 1;
    opts.callbacks.version = GIT_REMOTE_CALLBACKS_VERSION;
    opts.proxy_opts.version = GIT_PROXY_OPTIONS_VERSION;
    0
}

unsafe extern "C" fn fake_remote_connect(
    remote: *mut git_remote,
    _direction: c_int,
    callbacks: *const git_remote_callbacks,
    _proxy_opts: *const git_proxy_options,
    _custom_headers: *const git_strarray,
) -> c_int {
    fake_error_clear();
    let callbacks = &*callbacks;
    if let Err(rc) = check_version("git_remote_callbacks", callbacks.version, GIT_REMOTE_CALLBACKS_VERSION) {
        return rc;
    }
    connect(&mut *(remote as *mut FakeRemote), callbacks)
}

unsafe extern "C" fn fake_remote_fetch(
    remote: *mut git_remote,
    _refspecs: *const git_strarray,
    opts: *const git_fetch_options,
    _reflog_message: *const c_char,
) -> c_int {
    fake_error_clear();
    let remote = &mut *(remote as *mut FakeRemote);
    let opts = &*opts;
    let versions = check_version("git_fetch_options", opts.version as c_uint, GIT_FETCH_OPTIONS_VERSION).and_then(
        |()| check_version("git_remote_callbacks", opts.callbacks.version, GIT_REMOTE_CALLBACKS_VERSION),
    );
    if let Err(rc) = versions {
        return rc;
    }
    let callbacks = &opts.callbacks;
    let rc = connect(remote, callbacks);
    if rc < 0 {
        return rc;
    }
    if let Some(cb) = callbacks.sideband_progress {
        for msg in &remote.sideband {
            let rc = cb(msg.as_ptr() as *const c_char, msg.len() as c_int, callbacks.payload);
            if rc < 0 {
                return after_callback(rc, "sideband progress");
            }
        }
    }
    if let Some(cb) = callbacks.transfer_progress {
        for stats in &remote.progress {
            let rc = cb(stats, callbacks.payload);
            if rc < 0 {
                return after_callback(rc, "transfer progress");
            }
        }
    }
    if let Some(cb) = callbacks.completion {
        for &completion in &remote.completions {
            let rc = cb(completion, callbacks.payload);
            if rc < 0 {
                return after_callback(rc, "completion");
            }
        }
    }
    if let Some(cb) = callbacks.update_tips {
        for (name, a, b) in &remote.tips {
            let rc = cb(name.as_ptr(), a, b, callbacks.payload);
            if rc < 0 {
                return after_callback(rc, "update tips");
            }
        }
    }
    0
}

unsafe extern "C" fn fake_remote_push(
    remote: *mut git_remote,
    refspecs: *const git_strarray,
    opts: *const git_push_options,
) -> c_int {
    fake_error_clear();
    let remote = &mut *(remote as *mut FakeRemote);
    let opts = &*opts;
    let versions = check_version("git_push_options", opts.version, GIT_PUSH_OPTIONS_VERSION).and_then(|()| {
        check_version("git_remote_callbacks", opts.callbacks.version, GIT_REMOTE_CALLBACKS_VERSION)
    });
    if let Err(rc) = versions {
        return rc;
    }
    let callbacks = &opts.callbacks;
    let rc = connect(remote, callbacks);
    if rc < 0 {
        return rc;
    }
    if let Some(cb) = callbacks.pack_progress {
        for &(stage, current, total) in &remote.pack_stages {
            let rc = cb(stage, current, total, callbacks.payload);
            if rc < 0 {
                return after_callback(rc, "pack progress");
            }
        }
    }
    if let Some(cb) = callbacks.push_transfer_progress {
        for &(current, total, bytes) in &remote.push_progress {
            let rc = cb(current, total, bytes, callbacks.payload);
            if rc < 0 {
                return after_callback(rc, "push transfer progress");
            }
        }
    }
    for spec in pathspecs(refspecs) {
        let dst = spec.rsplit(':').next().unwrap_or(&spec).to_string();
        let status = remote
            .rejected
            .iter()
            .find(|(r, _)| *r == dst)
            .map(|(_, why)| CString::new(why.as_str()).unwrap());
        if let Some(cb) = callbacks.push_update_reference {
            let dst_c = CString::new(dst.as_str()).unwrap();
            let rc = cb(
                dst_c.as_ptr(),
                status.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                callbacks.payload,
            );
            if rc < 0 {
                return after_callback(rc, "push update reference");
            }
        }
        if status.is_none() {
            remote.pushed.push(dst);
        }
    }
    0
}

unsafe extern "C" fn fake_remote_free(remote: *mut git_remote) {
    let remote = &mut *(remote as *mut FakeRemote);
    remote.handle_live_at_free =
        Handle::from_payload(remote.last_payload).is_some_and(|h| registry().lookup(h).is_ok());
    remote.freed = true;
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

pub static INSTALLED_ALLOCATOR: AtomicPtr<AllocatorVTable> = AtomicPtr::new(ptr::null_mut());

unsafe extern "C" fn fake_stdalloc_init_allocator(allocator: *mut AllocatorVTable) -> c_int {
    *allocator = AllocatorVTable::system();
    0
}

unsafe extern "C" fn fake_set_allocator(allocator: *const AllocatorVTable) -> c_int {
    if allocator.is_null() {
        set_error(GIT_ERROR_INVALID, "allocator is null");
        return GIT_ERROR;
    }
    INSTALLED_ALLOCATOR.store(allocator as *mut AllocatorVTable, Ordering::SeqCst);
    0
}

unsafe extern "C" fn fake_reject_allocator(_allocator: *const AllocatorVTable) -> c_int {
    set_error(GIT_ERROR_INVALID, "allocator cannot be changed while the library is in use");
    GIT_ERROR
}
