use std::io;
use std::path::{Path, PathBuf};

use git2_bridge_core::{env_bool, env_path, env_u32};

use crate::sink::{FileSink, Sink};
use crate::socket::{SocketSink, DEFAULT_SOCKET_PATH};

pub const ENV_LOG: &str = "GIT2_DEBUG_ALLOCATOR_LOG";
pub const ENV_SOCKET: &str = "GIT2_DEBUG_ALLOCATOR_SOCKET";
pub const ENV_SOCKET_PATH: &str = "GIT2_DEBUG_ALLOCATOR_SOCKET_PATH";
pub const ENV_BACKTRACE_DEPTH: &str = "GIT2_DEBUG_ALLOCATOR_BACKTRACE_DEPTH";
pub const ENV_SYMBOLIZE: &str = "GIT2_DEBUG_ALLOCATOR_SYMBOLIZE";
pub const ENV_TRUNCATE: &str = "GIT2_DEBUG_ALLOCATOR_TRUNCATE";

pub const DEFAULT_BACKTRACE_DEPTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("debug allocator already installed")]
    AlreadyInstalled,
    #[error("failed to open allocation sink {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    File(PathBuf),
    Socket(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    pub target: SinkTarget,
    /// Frames captured per `Alloc`; 0 disables capture.
    pub backtrace_depth: usize,
    /// Resolve symbols before writing to the file sink. The socket sink
    /// always symbolizes.
    pub symbolize_file_frames: bool,
    pub truncate: bool,
}

impl TraceConfig {
    pub fn file(path: impl Into<PathBuf>) -> TraceConfig {
        TraceConfig {
            target: SinkTarget::File(path.into()),
            backtrace_depth: DEFAULT_BACKTRACE_DEPTH,
            symbolize_file_frames: false,
            truncate: true,
        }
    }

    pub fn socket(path: impl Into<PathBuf>) -> TraceConfig {
        TraceConfig {
            target: SinkTarget::Socket(path.into()),
            ..TraceConfig::file(PathBuf::new())
        }
    }

    pub fn default_socket() -> TraceConfig {
        TraceConfig::socket(DEFAULT_SOCKET_PATH)
    }

    /// Reads the `GIT2_DEBUG_ALLOCATOR_*` variables. Returns `None` when
    /// neither a log path nor the socket switch is set.
    pub fn from_env() -> Option<TraceConfig> {
        let mut config = if let Some(path) = env_path(ENV_LOG) {
            TraceConfig::file(path)
        } else if env_bool(ENV_SOCKET, false) {
            TraceConfig::socket(
                env_path(ENV_SOCKET_PATH).unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH)),
            )
        } else {
            return None;
        };
        config.backtrace_depth =
            env_u32(ENV_BACKTRACE_DEPTH, DEFAULT_BACKTRACE_DEPTH as u32) as usize;
        config.symbolize_file_frames = env_bool(ENV_SYMBOLIZE, false);
        config.truncate = env_bool(ENV_TRUNCATE, true);
        Some(config)
    }

    pub fn path(&self) -> &Path {
        match &self.target {
            SinkTarget::File(p) | SinkTarget::Socket(p) => p,
        }
    }

    pub fn open_sink(&self) -> Result<Sink, SetupError> {
        let wrap = |source: io::Error| SetupError::Sink {
            path: self.path().to_path_buf(),
            source,
        };
        match &self.target {
            SinkTarget::File(path) => {
                let sink = FileSink::create(path, self.truncate).map_err(wrap)?;
                Ok(Sink::File(sink.with_symbolized_frames(self.symbolize_file_frames)))
            }
            SinkTarget::Socket(path) => Ok(Sink::Socket(SocketSink::connect(path).map_err(wrap)?)),
        }
    }
}
