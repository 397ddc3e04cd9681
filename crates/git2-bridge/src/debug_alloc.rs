//! Routes every native allocation through the allocation tracer.

use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::ptr;
use std::sync::{Mutex, PoisonError};

use git2_alloc_trace::{install_with, installed, AllocatorVTable, SetupError, TraceConfig, DEBUG_VTABLE};
use once_cell::sync::OnceCell;

use crate::error::Error;
use crate::native::NativeLibrary;

#[derive(Debug, thiserror::Error)]
pub enum DebugAllocError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("native allocator setup failed: {0}")]
    Native(Error),
}

/// Whether a native library has accepted the tracing vtable. The lock also
/// serializes setup attempts.
static COMMITTED: Mutex<bool> = Mutex::new(false);

/// Wraps the library's own allocator with the tracer described by `config`
/// and installs the result. Can succeed once per process.
///
/// The tracer itself cannot be uninstalled, so when the library refuses it
/// the tracer stays in place and a later call only retries handing it over;
/// `config` is ignored on that retry.
pub fn setup(lib: &NativeLibrary, config: &TraceConfig) -> Result<(), DebugAllocError> {
    let mut committed = COMMITTED.lock().unwrap_or_else(PoisonError::into_inner);
    if *committed {
        return Err(SetupError::AlreadyInstalled.into());
    }
    let vtable = if installed().is_some() {
        log::info!("debug allocator already installed, retrying the handover");
        &DEBUG_VTABLE
    } else {
        let mut real = AllocatorVTable::system();
        let rc = unsafe { (lib.stdalloc_init_allocator)(&mut real) };
        if rc < 0 {
            return Err(DebugAllocError::Native(Error::last(lib, rc)));
        }
        install_with(real, config)?
    };
    let rc = unsafe { (lib.set_allocator)(vtable) };
    if rc < 0 {
        return Err(DebugAllocError::Native(Error::last(lib, rc)));
    }
    *committed = true;
    Ok(())
}

static ENV_CONFIG: OnceCell<Option<TraceConfig>> = OnceCell::new();

/// Like [`setup`] with the configuration from the `GIT2_DEBUG_ALLOCATOR_*`
/// environment variables. Returns `false` when tracing is not requested.
pub fn setup_from_env(lib: &NativeLibrary) -> Result<bool, DebugAllocError> {
    match ENV_CONFIG.get_or_init(TraceConfig::from_env) {
        Some(config) => setup(lib, config).map(|()| true),
        None => Ok(false),
    }
}

/// Installs the tracer over the system allocator and returns the vtable to
/// pass to `git_libgit2_opts(GIT_OPT_SET_ALLOCATOR, ...)`. A null `log_path`
/// selects the socket sink at its well-known address. Returns null on any
/// failure.
#[no_mangle]
pub extern "C" fn git2_bridge_debug_allocator(log_path: *const c_char) -> *const AllocatorVTable {
    std::panic::catch_unwind(|| {
        let config = if log_path.is_null() {
            TraceConfig::default_socket()
        } else {
            let path = unsafe { CStr::from_ptr(log_path) };
            let path = PathBuf::from(path.to_string_lossy().into_owned());
            TraceConfig::file(path)
        };
        match install_with(AllocatorVTable::system(), &config) {
            Ok(vtable) => vtable as *const AllocatorVTable,
            Err(err) => {
                log::error!("debug allocator setup failed: {err}");
                ptr::null()
            }
        }
    })
    .unwrap_or(ptr::null())
}
