//! Allocation tracing for a native library that routes every allocation
//! through a pluggable allocator vtable.
//!
//! [`Interceptor`] wraps the real vtable and reports each successful call as
//! an [`AllocEvent`] to an [`EventSink`]: a text log ([`FileSink`]) or a local
//! `SOCK_SEQPACKET` socket ([`SocketSink`]). [`HeapTracker`] rebuilds the live
//! heap on the consuming side.

pub mod config;
pub mod event;
pub mod frames;
pub mod heap;
pub mod interceptor;
pub mod sink;
pub mod socket;
pub mod vtable;

pub use config::{SetupError, SinkTarget, TraceConfig};
pub use event::{AllocEvent, CallSite, DecodeError, EventKind};
pub use frames::Frames;
pub use heap::{HeapStats, HeapTracker, LeakEntry, TrackError};
pub use interceptor::{install, install_with, installed, Interceptor, DEBUG_VTABLE};
pub use sink::{EventSink, FileSink, Sink};
pub use socket::{EventConnection, EventListener, RecvError, SocketSink, DEFAULT_SOCKET_PATH};
pub use vtable::AllocatorVTable;
