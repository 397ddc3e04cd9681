use std::fs::{File, OpenOptions};
use std::io::{self, Write as _};
use std::os::unix::fs::OpenOptionsExt as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::event::AllocEvent;
use crate::socket::SocketSink;

/// Consumer of allocation events. Every implementation writes one event with
/// a single write so concurrent producers never interleave bytes.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AllocEvent) -> io::Result<()>;

    /// Whether backtraces should be resolved to symbols before `emit`.
    fn symbolizes_frames(&self) -> bool {
        false
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &AllocEvent) -> io::Result<()> {
        (**self).emit(event)
    }

    fn symbolizes_frames(&self) -> bool {
        (**self).symbolizes_frames()
    }
}

/// Append-only text log, one line per event.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
    symbolize: bool,
}

impl FileSink {
    pub fn create(path: &Path, truncate: bool) -> io::Result<FileSink> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(path)?;
        if truncate {
            file.set_len(0)?;
        }
        Ok(FileSink {
            file,
            path: path.to_path_buf(),
            symbolize: false,
        })
    }

    pub fn with_symbolized_frames(mut self, symbolize: bool) -> FileSink {
        self.symbolize = symbolize;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileSink {
    fn emit(&self, event: &AllocEvent) -> io::Result<()> {
        write_once(&self.file, event.to_line().as_bytes())
    }

    fn symbolizes_frames(&self) -> bool {
        self.symbolize
    }
}

fn write_once(mut file: &File, buf: &[u8]) -> io::Result<()> {
    loop {
        match file.write(buf) {
            Ok(n) if n == buf.len() => return Ok(()),
            Ok(n) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {n} of {} bytes", buf.len()),
                ))
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// The two transports behind one producer contract.
#[derive(Debug)]
pub enum Sink {
    File(FileSink),
    Socket(SocketSink),
}

impl Sink {
    pub fn describe(&self) -> String {
        match self {
            Sink::File(f) => format!("file {}", f.path().display()),
            Sink::Socket(s) => format!("socket {}", s.path().display()),
        }
    }
}

impl EventSink for Sink {
    fn emit(&self, event: &AllocEvent) -> io::Result<()> {
        match self {
            Sink::File(f) => f.emit(event),
            Sink::Socket(s) => s.emit(event),
        }
    }

    fn symbolizes_frames(&self) -> bool {
        match self {
            Sink::File(f) => f.symbolizes_frames(),
            Sink::Socket(s) => s.symbolizes_frames(),
        }
    }
}
