#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_void};
use std::ptr;

pub type MallocFn = unsafe extern "C" fn(len: usize, file: *const c_char, line: c_int) -> *mut c_void;
pub type CallocFn =
    unsafe extern "C" fn(nelem: usize, elsize: usize, file: *const c_char, line: c_int) -> *mut c_void;
pub type StrdupFn =
    unsafe extern "C" fn(s: *const c_char, file: *const c_char, line: c_int) -> *mut c_char;
pub type StrndupFn =
    unsafe extern "C" fn(s: *const c_char, n: usize, file: *const c_char, line: c_int) -> *mut c_char;
pub type ReallocFn =
    unsafe extern "C" fn(ptr: *mut c_void, size: usize, file: *const c_char, line: c_int) -> *mut c_void;
pub type ReallocArrayFn = unsafe extern "C" fn(
    ptr: *mut c_void,
    nelem: usize,
    elsize: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void;
pub type FreeFn = unsafe extern "C" fn(ptr: *mut c_void);

/// Allocation slots of the native library, in `git_allocator` order.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AllocatorVTable {
    pub gmalloc: MallocFn,
    pub gcalloc: CallocFn,
    pub gstrdup: StrdupFn,
    pub gstrndup: StrndupFn,
    pub gsubstrdup: StrndupFn,
    pub grealloc: ReallocFn,
    pub greallocarray: ReallocArrayFn,
    pub gmallocarray: CallocFn,
    pub gfree: FreeFn,
}

impl AllocatorVTable {
    /// The process allocator.
    pub const fn system() -> AllocatorVTable {
        AllocatorVTable {
            gmalloc: sys_malloc,
            gcalloc: sys_calloc,
            gstrdup: sys_strdup,
            gstrndup: sys_strndup,
            gsubstrdup: sys_substrdup,
            grealloc: sys_realloc,
            greallocarray: sys_reallocarray,
            gmallocarray: sys_mallocarray,
            gfree: sys_free,
        }
    }
}

impl std::fmt::Debug for AllocatorVTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatorVTable")
            .field("gmalloc", &(self.gmalloc as usize as *const ()))
            .field("gfree", &(self.gfree as usize as *const ()))
            .finish_non_exhaustive()
    }
}

unsafe extern "C" fn sys_malloc(len: usize, _file: *const c_char, _line: c_int) -> *mut c_void {
    libc::malloc(len)
}

unsafe extern "C" fn sys_calloc(
    nelem: usize,
    elsize: usize,
    _file: *const c_char,
    _line: c_int,
) -> *mut c_void {
    libc::calloc(nelem, elsize)
}

unsafe extern "C" fn sys_strdup(s: *const c_char, _file: *const c_char, _line: c_int) -> *mut c_char {
    libc::strdup(s)
}

unsafe extern "C" fn sys_strndup(
    s: *const c_char,
    n: usize,
    _file: *const c_char,
    _line: c_int,
) -> *mut c_char {
    copy_str(s, libc::strnlen(s, n))
}

/// Copies exactly `n` bytes of `s`, whatever they contain.
unsafe extern "C" fn sys_substrdup(
    s: *const c_char,
    n: usize,
    _file: *const c_char,
    _line: c_int,
) -> *mut c_char {
    copy_str(s, n)
}

unsafe fn copy_str(s: *const c_char, n: usize) -> *mut c_char {
    let Some(alloc_len) = n.checked_add(1) else {
        return ptr::null_mut();
    };
    let out = libc::malloc(alloc_len) as *mut c_char;
    if out.is_null() {
        return out;
    }
    ptr::copy_nonoverlapping(s, out, n);
    *out.add(n) = 0;
    out
}

unsafe extern "C" fn sys_realloc(
    ptr: *mut c_void,
    size: usize,
    _file: *const c_char,
    _line: c_int,
) -> *mut c_void {
    libc::realloc(ptr, size)
}

unsafe extern "C" fn sys_reallocarray(
    ptr: *mut c_void,
    nelem: usize,
    elsize: usize,
    _file: *const c_char,
    _line: c_int,
) -> *mut c_void {
    match nelem.checked_mul(elsize) {
        Some(size) => libc::realloc(ptr, size),
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn sys_mallocarray(
    nelem: usize,
    elsize: usize,
    _file: *const c_char,
    _line: c_int,
) -> *mut c_void {
    match nelem.checked_mul(elsize) {
        Some(size) => libc::malloc(size),
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn sys_free(ptr: *mut c_void) {
    libc::free(ptr)
}
