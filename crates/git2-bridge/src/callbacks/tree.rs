use std::ffi::{c_char, c_int, c_void, CStr};
use std::fmt;
use std::marker::PhantomData;

use crate::error::CallError;
use crate::frame::{self, StackFrame};
use crate::handles::CallbackKind;
use crate::native::NativeLibrary;
use crate::oid::Oid;
use crate::raw::{self, git_tree, git_tree_entry};
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeWalkMode {
    PreOrder,
    PostOrder,
}

impl TreeWalkMode {
    fn raw(self) -> c_int {
        match self {
            TreeWalkMode::PreOrder => raw::GIT_TREEWALK_PRE,
            TreeWalkMode::PostOrder => raw::GIT_TREEWALK_POST,
        }
    }
}

/// What the walk should do after an entry has been visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeWalkResult {
    Continue,
    /// Do not descend into this entry. Only meaningful in pre-order.
    Skip,
}

impl TreeWalkResult {
    fn raw(self) -> c_int {
        match self {
            TreeWalkResult::Continue => 0,
            TreeWalkResult::Skip => 1,
        }
    }
}

/// A tree entry borrowed for the duration of one callback.
pub struct TreeEntry<'a> {
    lib: &'static NativeLibrary,
    raw: *const git_tree_entry,
    _marker: PhantomData<&'a git_tree_entry>,
}

impl<'a> TreeEntry<'a> {
    pub fn name_bytes(&self) -> &'a [u8] {
        unsafe {
            let name = (self.lib.tree_entry_name)(self.raw);
            if name.is_null() {
                &[]
            } else {
                CStr::from_ptr(name).to_bytes()
            }
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        std::str::from_utf8(self.name_bytes()).ok()
    }

    pub fn id(&self) -> Oid {
        unsafe { Oid::from_raw((self.lib.tree_entry_id)(self.raw)) }
    }

    pub fn filemode(&self) -> i32 {
        unsafe { (self.lib.tree_entry_filemode)(self.raw) }
    }
}

impl fmt::Debug for TreeEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeEntry")
            .field("name", &String::from_utf8_lossy(self.name_bytes()))
            .field("id", &self.id())
            .field("filemode", &format_args!("{:o}", self.filemode()))
            .finish()
    }
}

/// Borrowed view of a native tree.
pub struct Tree {
    lib: &'static NativeLibrary,
    raw: *const git_tree,
}

impl Tree {
    /// # Safety
    ///
    /// `raw` must be a valid tree of `lib` that outlives the returned view.
    pub unsafe fn from_raw(lib: &'static NativeLibrary, raw: *const git_tree) -> Tree {
        Tree { lib, raw }
    }

    pub fn raw(&self) -> *const git_tree {
        self.raw
    }

    /// Visits every entry below this tree. The callback receives the path of
    /// the entry's parent (empty for the root, otherwise ending in `/`).
    pub fn walk<F, E>(&self, mode: TreeWalkMode, callback: F) -> Result<(), CallError<E>>
    where
        F: FnMut(&str, &TreeEntry<'_>) -> Result<TreeWalkResult, E>,
        E: fmt::Display,
    {
        let lib = self.lib;
        let tree = self.raw;
        StackFrame::<F, E>::new(lib, callback)
            .run(CallbackKind::TreeWalk, |payload| unsafe {
                (lib.tree_walk)(tree, mode.raw(), Some(tree_walk_cb::<F, E>), payload)
            })
            .map(drop)
    }
}

unsafe extern "C" fn tree_walk_cb<F, E>(
    root: *const c_char,
    entry: *const git_tree_entry,
    payload: *mut c_void,
) -> c_int
where
    F: FnMut(&str, &TreeEntry<'_>) -> Result<TreeWalkResult, E>,
    E: fmt::Display,
{
    frame::dispatch::<F, E>(payload, CallbackKind::TreeWalk, |lib, callback| {
        let root = util::lossy(root);
        let entry = TreeEntry {
            lib,
            raw: entry,
            _marker: PhantomData,
        };
        callback(&root, &entry).map(TreeWalkResult::raw)
    })
}
