//! Pieces shared by the callback bridge and the allocation tracer: the fatal
//! fault path and the environment-variable configuration helpers.

use std::path::PathBuf;

pub const TRAP_UNKNOWN_HANDLE: i32 = 9701;
pub const TRAP_CONTEXT_KIND: i32 = 9702;
pub const TRAP_DOUBLE_CAPTURE: i32 = 9703;
pub const TRAP_SINK_WRITE: i32 = 9710;
pub const TRAP_ALLOCATOR_NOT_INSTALLED: i32 = 9711;
pub const TRAP_MALFORMED_RECORD: i32 = 9712;

/// An internal invariant violation. A broken bridge cannot vouch for any later
/// call, so these are never handed back as error values; see [`trap`].
#[derive(Debug, thiserror::Error)]
pub enum BridgeFault {
    #[error("unknown callback handle {0}")]
    UnknownHandle(usize),
    #[error("callback handle {handle} holds a {found} context, expected {expected}")]
    ContextKind {
        handle: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("error capture written twice during one callback invocation")]
    DoubleCapture,
    #[error("allocation event sink write failed: {0}")]
    SinkWrite(#[source] std::io::Error),
    #[error("debug allocator wrapper invoked before the allocator was installed")]
    AllocatorNotInstalled,
    #[error("malformed allocation record: {0}")]
    MalformedRecord(String),
}

impl BridgeFault {
    pub fn code(&self) -> i32 {
        match self {
            BridgeFault::UnknownHandle(_) => TRAP_UNKNOWN_HANDLE,
            BridgeFault::ContextKind { .. } => TRAP_CONTEXT_KIND,
            BridgeFault::DoubleCapture => TRAP_DOUBLE_CAPTURE,
            BridgeFault::SinkWrite(_) => TRAP_SINK_WRITE,
            BridgeFault::AllocatorNotInstalled => TRAP_ALLOCATOR_NOT_INSTALLED,
            BridgeFault::MalformedRecord(_) => TRAP_MALFORMED_RECORD,
        }
    }
}

/// Reports `fault` and terminates the process without unwinding.
pub fn trap(fault: BridgeFault) -> ! {
    let code = fault.code();
    log::error!("fatal bridge fault {code}: {fault}");
    eprintln!("git2-bridge: fatal bridge fault {code}: {fault}");
    std::process::abort()
}

pub fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

pub fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

/// Non-empty path value of `name`, if set.
pub fn env_path(name: &str) -> Option<PathBuf> {
    let v = std::env::var_os(name)?;
    if v.is_empty() {
        return None;
    }
    Some(PathBuf::from(v))
}
