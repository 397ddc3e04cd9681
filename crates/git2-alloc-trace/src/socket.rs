//! Local `SOCK_SEQPACKET` transport: one record per message, connection
//! oriented, so message boundaries survive without extra framing.

use std::ffi::c_void;
use std::io;
use std::os::fd::{AsRawFd as _, FromRawFd as _, OwnedFd};
use std::os::unix::ffi::OsStrExt as _;
use std::path::{Path, PathBuf};

use git2_bridge_core::{trap, BridgeFault};

use crate::event::{AllocEvent, DecodeError, MAX_RECORD_LEN};
use crate::sink::EventSink;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/git2_bridge_alloc.sock";

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    #[error("socket receive failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed record: {0}")]
    Decode(#[from] DecodeError),
}

/// Producer side: symbolizes frames and sends each event as one message.
#[derive(Debug)]
pub struct SocketSink {
    fd: OwnedFd,
    path: PathBuf,
}

impl SocketSink {
    pub fn connect(path: &Path) -> io::Result<SocketSink> {
        let fd = seqpacket_socket()?;
        let (addr, len) = sockaddr_un(path)?;
        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_un as *const libc::sockaddr,
                len,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(SocketSink {
            fd,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for SocketSink {
    fn emit(&self, event: &AllocEvent) -> io::Result<()> {
        let record = event.encode_record();
        if record.len() > MAX_RECORD_LEN {
            trap(BridgeFault::MalformedRecord(format!(
                "{} byte record exceeds the {MAX_RECORD_LEN} byte message limit",
                record.len()
            )));
        }
        loop {
            let n = unsafe {
                libc::send(
                    self.fd.as_raw_fd(),
                    record.as_ptr() as *const c_void,
                    record.len(),
                    SEND_FLAGS,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if n as usize != record.len() {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short send: {n} of {} bytes", record.len()),
                ));
            }
            return Ok(());
        }
    }

    fn symbolizes_frames(&self) -> bool {
        true
    }
}

/// Consumer side of the socket transport. The socket file is removed when
/// the listener is dropped.
#[derive(Debug)]
pub struct EventListener {
    fd: OwnedFd,
    path: PathBuf,
}

impl EventListener {
    pub fn bind(path: &Path) -> io::Result<EventListener> {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        let fd = seqpacket_socket()?;
        let (addr, len) = sockaddr_un(path)?;
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_un as *const libc::sockaddr,
                len,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::listen(fd.as_raw_fd(), 16) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(EventListener {
            fd,
            path: path.to_path_buf(),
        })
    }

    pub fn accept(&self) -> io::Result<EventConnection> {
        loop {
            let raw = unsafe {
                libc::accept(self.fd.as_raw_fd(), std::ptr::null_mut(), std::ptr::null_mut())
            };
            if raw < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };
            set_cloexec(&fd)?;
            return Ok(EventConnection {
                fd,
                buf: vec![0u8; MAX_RECORD_LEN],
            });
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// One accepted producer connection.
#[derive(Debug)]
pub struct EventConnection {
    fd: OwnedFd,
    buf: Vec<u8>,
}

impl EventConnection {
    /// Next event, or `None` once the producer has closed the connection.
    pub fn recv(&mut self) -> Result<Option<AllocEvent>, RecvError> {
        loop {
            let n = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    self.buf.as_mut_ptr() as *mut c_void,
                    self.buf.len(),
                    0,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }
            if n == 0 {
                return Ok(None);
            }
            let event = AllocEvent::decode_record(&self.buf[..n as usize])?;
            return Ok(Some(event));
        }
    }
}

impl Iterator for EventConnection {
    type Item = Result<AllocEvent, RecvError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv().transpose()
    }
}

fn seqpacket_socket() -> io::Result<OwnedFd> {
    let raw = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_SEQPACKET, 0) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };
    set_cloexec(&fd)?;
    Ok(fd)
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn sockaddr_un(path: &Path) -> io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

    let bytes = path.as_os_str().as_bytes();
    if bytes.contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path contains a NUL byte",
        ));
    }
    if bytes.len() >= addr.sun_path.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("socket path too long: {}", path.display()),
        ));
    }
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }

    let base = &addr as *const libc::sockaddr_un as usize;
    let offset = addr.sun_path.as_ptr() as usize - base;
    Ok((addr, (offset + bytes.len() + 1) as libc::socklen_t))
}
