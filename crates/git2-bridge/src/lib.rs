//! Boundary layer between a native source-control library and Rust callers.
//!
//! Native code reaches Rust closures through `extern "C"` trampolines that
//! resolve an opaque handle passed as the callback payload. Closures that only
//! live for one call keep their error values intact ([`CallError::Callback`]);
//! closures attached to long-lived native objects report failures through the
//! library's own error state. [`debug_alloc`] installs the allocation tracer
//! from `git2-alloc-trace` as the library's allocator.

#![allow(clippy::missing_safety_doc)]

mod attached;
pub mod callbacks;
pub mod capture;
pub mod debug_alloc;
pub mod error;
mod frame;
pub mod handles;
pub mod native;
pub mod oid;
pub mod raw;
mod util;

pub use callbacks::diff::{Delta, Diff, DiffDelta, DiffFile, DiffHunk, DiffLine};
pub use callbacks::index::{Index, IndexAction, IndexAddOption, IndexMatchedPath};
pub use callbacks::odb::Odb;
pub use callbacks::packbuilder::PackBuilder;
pub use callbacks::rebase::{CommitCreate, CommitCreateResult, Rebase, RebaseOptions, Signature};
pub use callbacks::remote::{
    Cert, CertType, CertificateCheckStatus, Credential, CredentialRequest, CredentialType,
    Direction, PackBuilderStage, Progress, Remote, RemoteCallbacks, RemoteCompletion,
};
pub use callbacks::repository::{Repository, Submodule};
pub use callbacks::tree::{Tree, TreeEntry, TreeWalkMode, TreeWalkResult};
pub use capture::ErrorCapture;
pub use debug_alloc::DebugAllocError;
pub use error::{CallError, CallbackError, Error};
pub use handles::{registry, CallbackKind, ContextPtr, Handle, HandleError, Registry};
pub use native::{apply_capture, NativeLibrary};
pub use oid::Oid;
