use std::borrow::Cow;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::error::Error;
use crate::raw::{git_strarray, GIT_ERROR, GIT_ERROR_INVALID};

pub(crate) fn to_cstring(s: &str) -> Result<CString, Error> {
    CString::new(s).map_err(|_| {
        Error::new(
            GIT_ERROR,
            GIT_ERROR_INVALID,
            format!("string contains a NUL byte: {s:?}"),
        )
    })
}

pub(crate) fn opt_cstring(s: Option<&str>) -> Result<Option<CString>, Error> {
    s.map(to_cstring).transpose()
}

pub(crate) fn opt_ptr(s: &Option<CString>) -> *const c_char {
    s.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

/// Borrows a native string; null reads as empty.
pub(crate) unsafe fn lossy<'a>(s: *const c_char) -> Cow<'a, str> {
    if s.is_null() {
        Cow::Borrowed("")
    } else {
        CStr::from_ptr(s).to_string_lossy()
    }
}

pub(crate) unsafe fn opt_bytes<'a>(s: *const c_char) -> Option<&'a [u8]> {
    if s.is_null() {
        None
    } else {
        Some(CStr::from_ptr(s).to_bytes())
    }
}

pub(crate) unsafe fn opt_str<'a>(s: *const c_char) -> Option<&'a str> {
    opt_bytes(s).and_then(|b| std::str::from_utf8(b).ok())
}

/// Owned `git_strarray` for passing a list of strings into native code.
pub(crate) struct StrArray {
    _owned: Vec<CString>,
    ptrs: Vec<*mut c_char>,
}

impl StrArray {
    pub(crate) fn new(items: &[&str]) -> Result<StrArray, Error> {
        let owned = items
            .iter()
            .map(|s| to_cstring(s))
            .collect::<Result<Vec<_>, _>>()?;
        let ptrs = owned.iter().map(|s| s.as_ptr() as *mut c_char).collect();
        Ok(StrArray { _owned: owned, ptrs })
    }

    pub(crate) fn raw(&self) -> git_strarray {
        git_strarray {
            strings: self.ptrs.as_ptr() as *mut *mut c_char,
            count: self.ptrs.len(),
        }
    }
}
