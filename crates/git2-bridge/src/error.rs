use std::ffi::{c_int, CStr};

use crate::native::NativeLibrary;
use crate::raw::{GIT_EEXISTS, GIT_ENOTFOUND, GIT_ERROR_INVALID, GIT_EUSER};

/// An error reported by the native library: its return code plus the class
/// and message read from its error state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}; class={class}; code={code}")]
pub struct Error {
    code: c_int,
    class: c_int,
    message: String,
}

impl Error {
    pub fn new(code: c_int, class: c_int, message: impl Into<String>) -> Error {
        Error {
            code,
            class,
            message: message.into(),
        }
    }

    /// Copies the native error state for a call that returned `code`.
    pub fn last(lib: &NativeLibrary, code: c_int) -> Error {
        let raw = unsafe { (lib.error_last)() };
        if raw.is_null() {
            return Error::new(code, GIT_ERROR_INVALID, "no message");
        }
        let (class, message) = unsafe {
            let raw = &*raw;
            let message = if raw.message.is_null() {
                "no message".to_string()
            } else {
                CStr::from_ptr(raw.message).to_string_lossy().into_owned()
            };
            (raw.klass, message)
        };
        Error::new(code, class, message)
    }

    pub fn code(&self) -> c_int {
        self.code
    }

    pub fn class(&self) -> c_int {
        self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.code == GIT_ENOTFOUND
    }

    pub fn is_exists(&self) -> bool {
        self.code == GIT_EEXISTS
    }

    /// The failure originated in a user callback.
    pub fn is_user(&self) -> bool {
        self.code == GIT_EUSER
    }
}

/// Outcome of a call that runs a stack-local callback: the callback's own
/// error comes back unchanged, ahead of any native status.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error("callback failed: {0}")]
    Callback(E),
    #[error(transparent)]
    Native(#[from] Error),
}

impl<E> CallError<E> {
    pub fn callback(self) -> Option<E> {
        match self {
            CallError::Callback(e) => Some(e),
            CallError::Native(_) => None,
        }
    }

    pub fn native(&self) -> Option<&Error> {
        match self {
            CallError::Native(e) => Some(e),
            CallError::Callback(_) => None,
        }
    }
}

/// Failure returned by callbacks attached to a long-lived native object.
/// Only the message crosses back into native code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> CallbackError {
        CallbackError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> CallbackError {
        CallbackError::new(message)
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> CallbackError {
        CallbackError::new(message)
    }
}

impl From<Error> for CallbackError {
    fn from(err: Error) -> CallbackError {
        CallbackError::new(err.message)
    }
}
