//! Opaque handles that stand in for managed contexts while native code holds
//! on to them as a `void *payload`.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock};

use git2_bridge_core::{trap, BridgeFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    TreeWalk,
    Diff,
    PackBuilder,
    Odb,
    Submodule,
    IndexMatchedPath,
    Rebase,
    Remote,
}

impl CallbackKind {
    pub fn name(self) -> &'static str {
        match self {
            CallbackKind::TreeWalk => "tree walk",
            CallbackKind::Diff => "diff",
            CallbackKind::PackBuilder => "pack-builder",
            CallbackKind::Odb => "object database",
            CallbackKind::Submodule => "submodule",
            CallbackKind::IndexMatchedPath => "index matched-path",
            CallbackKind::Rebase => "rebase",
            CallbackKind::Remote => "remote",
        }
    }
}

/// Non-zero identifier of a registered context. Zero is never issued, so a
/// null payload never names a live context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroUsize);

impl Handle {
    pub fn get(self) -> usize {
        self.0.get()
    }

    pub fn as_payload(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }

    pub fn from_payload(payload: *mut c_void) -> Option<Handle> {
        NonZeroUsize::new(payload as usize).map(Handle)
    }
}

/// Type-erased pointer to a managed context plus the kind it was registered
/// as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPtr {
    pub ptr: *mut (),
    pub kind: CallbackKind,
}

// The registry only stores and returns the pointer; whoever registered it
// keeps the pointee alive and reachable from the calling thread.
unsafe impl Send for ContextPtr {}
unsafe impl Sync for ContextPtr {}

impl ContextPtr {
    pub fn new<T>(ptr: *mut T, kind: CallbackKind) -> ContextPtr {
        ContextPtr {
            ptr: ptr.cast(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("callback handle {0} is not registered")]
    NotFound(usize),
}

#[derive(Debug, Default)]
pub struct Registry {
    slots: RwLock<Vec<Option<ContextPtr>>>,
}

impl Registry {
    pub const fn new() -> Registry {
        Registry {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Stores `ctx` under the smallest free handle.
    pub fn register(&self, ctx: ContextPtr) -> Handle {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let idx = match slots.iter().position(Option::is_none) {
            Some(idx) => {
                slots[idx] = Some(ctx);
                idx
            }
            None => {
                slots.push(Some(ctx));
                slots.len() - 1
            }
        };
        let handle = Handle(NonZeroUsize::MIN.saturating_add(idx));
        log::trace!("registered {} context as handle {}", ctx.kind.name(), handle.get());
        handle
    }

    pub fn lookup(&self, handle: Handle) -> Result<ContextPtr, HandleError> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(handle.get() - 1)
            .copied()
            .flatten()
            .ok_or(HandleError::NotFound(handle.get()))
    }

    pub fn release(&self, handle: Handle) -> Result<(), HandleError> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .get_mut(handle.get() - 1)
            .ok_or(HandleError::NotFound(handle.get()))?;
        if slot.take().is_none() {
            return Err(HandleError::NotFound(handle.get()));
        }
        while matches!(slots.last(), Some(None)) {
            slots.pop();
        }
        log::trace!("released handle {}", handle.get());
        Ok(())
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static REGISTRY: Registry = Registry::new();

/// The registry every trampoline resolves payloads against.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Resolves a native payload to the context registered for `kind`. Unknown
/// handles and kind mismatches are bridge faults.
pub(crate) fn resolve(payload: *mut c_void, kind: CallbackKind) -> *mut () {
    let Some(handle) = Handle::from_payload(payload) else {
        trap(BridgeFault::UnknownHandle(0));
    };
    let ctx = match registry().lookup(handle) {
        Ok(ctx) => ctx,
        Err(HandleError::NotFound(h)) => trap(BridgeFault::UnknownHandle(h)),
    };
    if ctx.kind != kind {
        trap(BridgeFault::ContextKind {
            handle: handle.get(),
            expected: kind.name(),
            found: ctx.kind.name(),
        });
    }
    ctx.ptr
}

/// Registration in the global registry, released on drop.
#[derive(Debug)]
pub struct ScopedHandle {
    handle: Handle,
}

impl ScopedHandle {
    pub fn register(ctx: ContextPtr) -> ScopedHandle {
        ScopedHandle {
            handle: registry().register(ctx),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        if let Err(err) = registry().release(self.handle) {
            log::warn!("{err}");
        }
    }
}
