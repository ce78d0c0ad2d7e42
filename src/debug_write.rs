//! Debug-write sink for engine debug builds.
//!
//! Duktape built with `DUK_USE_DEBUG` routes its internal debug log through
//! the `DUK_USE_DEBUG_WRITE(level, file, line, func, msg)` macro. Pointing
//! that macro at [`duk_shim_debug_write`] forwards the engine's log into
//! `tracing`, where the host application's subscriber decides what to keep.

use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::{c_char, c_long};

/// Engine debug levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugLevel {
    /// `DUK_LEVEL_DEBUG`
    Debug,
    /// `DUK_LEVEL_DDEBUG` and `DUK_LEVEL_DDDEBUG`
    Verbose,
}

impl From<c_long> for DebugLevel {
    fn from(level: c_long) -> Self {
        if level <= 0 {
            DebugLevel::Debug
        } else {
            DebugLevel::Verbose
        }
    }
}

/// Emit one engine debug line as a `tracing` event
pub fn debug_write(level: DebugLevel, file: &str, line: i64, func: &str, msg: &str) {
    match level {
        DebugLevel::Debug => tracing::debug!(
            target: "duktape",
            file,
            line,
            func,
            "{}",
            msg
        ),
        DebugLevel::Verbose => tracing::trace!(
            target: "duktape",
            file,
            line,
            func,
            "{}",
            msg
        ),
    }
}

/// C entry point for `DUK_USE_DEBUG_WRITE`
///
/// Strings are converted lossily; null pointers are treated as empty
/// strings.
///
/// # Safety
///
/// Each non-null pointer must point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn duk_shim_debug_write(
    level: c_long,
    file: *const c_char,
    line: c_long,
    func: *const c_char,
    msg: *const c_char,
) {
    // SAFETY: forwarded from the caller's contract.
    let (file, func, msg) = unsafe { (lossy(file), lossy(func), lossy(msg)) };
    debug_write(DebugLevel::from(level), &file, i64::from(line), &func, &msg);
}

/// # Safety
///
/// `ptr` is null or points to a NUL-terminated string.
unsafe fn lossy<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed("")
    } else {
        // SAFETY: non-null and NUL-terminated per the caller.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn test_level_mapping() {
        assert_eq!(DebugLevel::from(0), DebugLevel::Debug);
        assert_eq!(DebugLevel::from(1), DebugLevel::Verbose);
        assert_eq!(DebugLevel::from(2), DebugLevel::Verbose);
        assert_eq!(DebugLevel::from(-1), DebugLevel::Debug);
    }

    #[test]
    fn test_lossy_conversion() {
        let valid = CString::new("duk_heap.c").unwrap();
        let invalid = CString::new(vec![b'o', 0xff, b'k']).unwrap();
        unsafe {
            assert_eq!(lossy(ptr::null()), "");
            assert_eq!(lossy(valid.as_ptr()), "duk_heap.c");
            assert_eq!(lossy(invalid.as_ptr()), "o\u{fffd}k");
        }
    }

    #[test]
    fn test_null_pointers_tolerated() {
        let msg = CString::new("heap created").unwrap();
        unsafe {
            duk_shim_debug_write(0, ptr::null(), 42, ptr::null(), msg.as_ptr());
            duk_shim_debug_write(2, ptr::null(), 0, ptr::null(), ptr::null());
        }
    }
}
