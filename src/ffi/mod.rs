//! FFI exports for C interop
//!
//! All functions in this module are exported with `#[no_mangle]`
//! and use C-compatible types. Probing itself needs host collaborators and
//! stays on the Rust side; these entry points hand a resolved configuration
//! to a streaming stack written in another language.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::config::CodecConfig;
use crate::error::Error;

// Thread-local error storage
thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

// =============================================================================
// Result Type
// =============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H264Result {
    Success = 0,
    ErrorDeviceUnavailable = 1,
    ErrorParameterSetsNotFound = 2,
    ErrorStorageUnavailable = 3,
    ErrorCleanupFailure = 4,
    ErrorInvalidFormat = 5,
    ErrorFileNotFound = 6,
    ErrorInvalidHandle = 7,
    ErrorUnknown = 99,
}

impl From<Error> for H264Result {
    fn from(e: Error) -> Self {
        set_last_error(&e.to_string());
        match e.to_ffi_code() {
            1 => H264Result::ErrorDeviceUnavailable,
            2 => H264Result::ErrorParameterSetsNotFound,
            3 => H264Result::ErrorStorageUnavailable,
            4 => H264Result::ErrorCleanupFailure,
            5 => H264Result::ErrorInvalidFormat,
            6 => H264Result::ErrorFileNotFound,
            _ => H264Result::ErrorUnknown,
        }
    }
}

// =============================================================================
// Opaque Handle
// =============================================================================

/// Opaque codec configuration handle
pub struct H264ConfigHandle {
    config: CodecConfig,
}

fn into_handle(
    result: crate::error::Result<CodecConfig>,
    out_handle: *mut *mut H264ConfigHandle,
) -> H264Result {
    match result {
        Ok(config) => {
            unsafe {
                *out_handle = Box::into_raw(Box::new(H264ConfigHandle { config }));
            }
            H264Result::Success
        }
        Err(e) => {
            unsafe {
                *out_handle = ptr::null_mut();
            }
            e.into()
        }
    }
}

fn c_str_arg<'a>(s: *const c_char, what: &str) -> Option<&'a str> {
    if s.is_null() {
        set_last_error(&format!("{} is null", what));
        return None;
    }
    match unsafe { CStr::from_ptr(s) }.to_str() {
        Ok(s) => Some(s),
        Err(_) => {
            set_last_error(&format!("Invalid UTF-8 in {}", what));
            None
        }
    }
}

/// Hand a Rust string to the caller, to be freed with `h264_string_free`
fn to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(s) => s.into_raw(),
        Err(_) => {
            set_last_error("String contains an interior NUL");
            ptr::null_mut()
        }
    }
}

// =============================================================================
// Error Handling
// =============================================================================

/// Get last error message
#[no_mangle]
pub extern "C" fn h264_get_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null()))
}

/// Clear last error
#[no_mangle]
pub extern "C" fn h264_clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Initialize the library (sets up logging).
/// Call once at application startup.
#[no_mangle]
pub extern "C" fn h264_init() {
    crate::init();
}

// =============================================================================
// Version Info
// =============================================================================

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Get library version
#[no_mangle]
pub extern "C" fn h264_get_version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

// =============================================================================
// Configuration Lifecycle
// =============================================================================

/// Build a configuration from an Annex-B byte stream
#[no_mangle]
pub extern "C" fn h264_config_from_annex_b(
    data: *const u8,
    len: usize,
    out_handle: *mut *mut H264ConfigHandle,
) -> H264Result {
    if out_handle.is_null() {
        return H264Result::ErrorInvalidHandle;
    }
    if data.is_null() {
        set_last_error("Data is null");
        unsafe {
            *out_handle = ptr::null_mut();
        }
        return H264Result::ErrorInvalidHandle;
    }

    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    into_handle(CodecConfig::from_annex_b(bytes), out_handle)
}

/// Read the configuration out of an MP4/3GP file
#[no_mangle]
pub extern "C" fn h264_config_from_container(
    path: *const c_char,
    out_handle: *mut *mut H264ConfigHandle,
) -> H264Result {
    if out_handle.is_null() {
        return H264Result::ErrorInvalidHandle;
    }
    let Some(path) = c_str_arg(path, "path") else {
        unsafe {
            *out_handle = ptr::null_mut();
        }
        return H264Result::ErrorInvalidHandle;
    };

    into_handle(CodecConfig::from_container_file(path), out_handle)
}

/// Parse a `<profile-level-id>,<sps>,<pps>` cache entry
#[no_mangle]
pub extern "C" fn h264_config_from_cache_text(
    text: *const c_char,
    out_handle: *mut *mut H264ConfigHandle,
) -> H264Result {
    if out_handle.is_null() {
        return H264Result::ErrorInvalidHandle;
    }
    let Some(text) = c_str_arg(text, "text") else {
        unsafe {
            *out_handle = ptr::null_mut();
        }
        return H264Result::ErrorInvalidHandle;
    };

    into_handle(CodecConfig::from_cache_text(text), out_handle)
}

/// Destroy configuration
#[no_mangle]
pub extern "C" fn h264_config_destroy(handle: *mut H264ConfigHandle) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
    }
}

// =============================================================================
// Accessors
// =============================================================================

/// profile-level-id as an integer (0 for a null handle)
#[no_mangle]
pub extern "C" fn h264_config_profile_level_id(handle: *const H264ConfigHandle) -> u32 {
    if handle.is_null() {
        return 0;
    }
    let handle = unsafe { &*handle };
    handle.config.profile_level_id()
}

/// Base64 SPS. Free with `h264_string_free`.
#[no_mangle]
pub extern "C" fn h264_config_sps_base64(handle: *const H264ConfigHandle) -> *mut c_char {
    if handle.is_null() {
        return ptr::null_mut();
    }
    let handle = unsafe { &*handle };
    to_c_string(handle.config.sps_base64())
}

/// Base64 PPS. Free with `h264_string_free`.
#[no_mangle]
pub extern "C" fn h264_config_pps_base64(handle: *const H264ConfigHandle) -> *mut c_char {
    if handle.is_null() {
        return ptr::null_mut();
    }
    let handle = unsafe { &*handle };
    to_c_string(handle.config.pps_base64())
}

/// Cache entry text. Free with `h264_string_free`.
#[no_mangle]
pub extern "C" fn h264_config_cache_text(handle: *const H264ConfigHandle) -> *mut c_char {
    if handle.is_null() {
        return ptr::null_mut();
    }
    let handle = unsafe { &*handle };
    to_c_string(&handle.config.to_cache_text())
}

/// Release a string returned by this library
#[no_mangle]
pub extern "C" fn h264_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}
