//! FFI bindings for the RFM segment engine
//!
//! This module provides C-compatible functions for calling the engine from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `rfm_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::BinConfig;
use crate::filter::TransactionFilter;
use crate::pipeline::{rfm_from_json, RfmEngine};
use crate::schema::TransactionAdapter;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Like `cstr_to_string`, but NULL means "not given" rather than an error
unsafe fn optional_cstr(ptr: *const c_char) -> Result<Option<String>, ()> {
    if ptr.is_null() {
        return Ok(None);
    }
    cstr_to_string(ptr).map(Some).ok_or(())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Run the pipeline on a JSON dataset and return the JSON report.
///
/// # Safety
/// - `dataset` must be a valid null-terminated C string.
/// - `filter` and `bins` may be NULL; otherwise they must be valid
///   null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `rfm_free_string`.
/// - Returns NULL on error; call `rfm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rfm_run_json(
    dataset: *const c_char,
    filter: *const c_char,
    bins: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let dataset_str = match cstr_to_string(dataset) {
        Some(s) => s,
        None => {
            set_last_error("Invalid dataset string pointer");
            return ptr::null_mut();
        }
    };

    let Ok(filter_str) = optional_cstr(filter) else {
        set_last_error("Invalid filter string");
        return ptr::null_mut();
    };

    let Ok(bins_str) = optional_cstr(bins) else {
        set_last_error("Invalid bins string");
        return ptr::null_mut();
    };

    match rfm_from_json(dataset_str, filter_str, bins_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return the default bin configuration as JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `rfm_free_string`.
#[no_mangle]
pub unsafe extern "C" fn rfm_default_bins_json() -> *mut c_char {
    clear_last_error();

    match BinConfig::default().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to an engine with a fixed bin configuration
pub struct RfmEngineHandle {
    engine: RfmEngine,
}

/// Create an engine.
///
/// # Safety
/// - `bins` may be NULL for the default bins; otherwise it must be a valid
///   null-terminated C string containing a bin configuration.
/// - Returns a pointer that must be freed with `rfm_engine_free`.
/// - Returns NULL on error; call `rfm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rfm_engine_new(bins: *const c_char) -> *mut RfmEngineHandle {
    clear_last_error();

    let Ok(bins_str) = optional_cstr(bins) else {
        set_last_error("Invalid bins string");
        return ptr::null_mut();
    };

    let config = match bins_str.as_deref().map(BinConfig::from_json) {
        None => BinConfig::default(),
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let handle = Box::new(RfmEngineHandle {
        engine: RfmEngine::with_bins(config),
    });
    Box::into_raw(handle)
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `rfm_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn rfm_engine_free(engine: *mut RfmEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Run an engine on a JSON dataset and return the JSON report.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `rfm_engine_new`.
/// - `dataset` must be a valid null-terminated C string.
/// - `filter` may be NULL; otherwise it must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `rfm_free_string`.
/// - Returns NULL on error; call `rfm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn rfm_engine_run(
    engine: *const RfmEngineHandle,
    dataset: *const c_char,
    filter: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;

    let dataset_str = match cstr_to_string(dataset) {
        Some(s) => s,
        None => {
            set_last_error("Invalid dataset string pointer");
            return ptr::null_mut();
        }
    };

    let Ok(filter_str) = optional_cstr(filter) else {
        set_last_error("Invalid filter string");
        return ptr::null_mut();
    };

    let result = TransactionAdapter::parse_array(&dataset_str).and_then(|transactions| {
        let filter = filter_str
            .as_deref()
            .map(|json| serde_json::from_str::<TransactionFilter>(json))
            .transpose()?;
        let report = handle.engine.report(&transactions, filter.as_ref())?;
        Ok(serde_json::to_string(&report)?)
    });

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an `rfm_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn rfm_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `rfm_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn rfm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn rfm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
