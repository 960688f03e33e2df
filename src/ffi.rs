//! C FFI bindings for u-bizlens.
//!
//! Exposes a session-based interface: load CSV text into an opaque
//! session, then pull reports out as JSON documents.
//!
//! # Design
//!
//! - **Opaque handle**: `*mut BizlensSession`
//! - **JSON out**: reports are returned as heap C strings freed with
//!   `bizlens_string_free`
//! - **Integer error codes**: 0 = success, negative = error
//! - **Thread-local error message**: `bizlens_last_error()`
//! - **`catch_unwind`**: every entry point that takes a pointer is wrapped
//!   so panics never cross the FFI boundary
//!
//! # Safety
//!
//! Null pointer arguments return `BIZLENS_ERR_NULL_PTR` (or a null
//! result) and set the last error.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use serde::Serialize;

use crate::error::Error;
use crate::filter::FilterSpec;
use crate::session::Session;

// ── Error handling ────────────────────────────────────────────────────

/// Error codes returned by FFI functions.
pub const BIZLENS_OK: i32 = 0;
pub const BIZLENS_ERR_NULL_PTR: i32 = -1;
pub const BIZLENS_ERR_INVALID_INPUT: i32 = -2;
pub const BIZLENS_ERR_PARSE_FAILED: i32 = -3;
pub const BIZLENS_ERR_NO_DATASET: i32 = -4;
pub const BIZLENS_ERR_PANIC: i32 = -99;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = CString::new(msg).ok();
    });
}

/// Returns the last error message, or null if no error.
/// The returned string is valid until the next error on this thread.
///
/// # Safety
/// The caller must not free the returned pointer.
#[no_mangle]
pub extern "C" fn bizlens_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| {
        let borrow = cell.borrow();
        match borrow.as_ref() {
            Some(cstr) => cstr.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn bizlens_clear_error() {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

fn error_code(err: &Error) -> i32 {
    match err {
        Error::CsvParse { .. } | Error::Io(_) => BIZLENS_ERR_PARSE_FAILED,
        Error::NoDataset => BIZLENS_ERR_NO_DATASET,
        _ => BIZLENS_ERR_INVALID_INPUT,
    }
}

/// Runs `f`, turning a panic into `fallback` plus a last-error message.
fn guard<T>(name: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            set_last_error(&format!("panic in {name}"));
            fallback
        }
    }
}

/// Borrows a C string as UTF-8.
///
/// # Safety
/// `s` must be null or a valid null-terminated string.
unsafe fn read_str<'a>(s: *const c_char, what: &str) -> Result<&'a str, i32> {
    if s.is_null() {
        set_last_error(&format!("null {what} pointer"));
        return Err(BIZLENS_ERR_NULL_PTR);
    }
    unsafe { CStr::from_ptr(s) }.to_str().map_err(|e| {
        set_last_error(&format!("invalid UTF-8 in {what}: {e}"));
        BIZLENS_ERR_INVALID_INPUT
    })
}

fn to_json_ptr<T: Serialize>(value: &T) -> *mut c_char {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            set_last_error(&format!("JSON encoding failed: {e}"));
            return ptr::null_mut();
        }
    };
    match CString::new(json) {
        Ok(c) => c.into_raw(),
        Err(e) => {
            set_last_error(&format!("JSON contains NUL: {e}"));
            ptr::null_mut()
        }
    }
}

// ── Session (opaque handle) ──────────────────────────────────────────

/// Opaque handle holding a [`Session`].
pub struct BizlensSession {
    session: Session,
}

/// Creates a session from CSV text (header row, comma-separated).
///
/// # Safety
/// - `csv_data` must be a valid null-terminated UTF-8 string.
/// - The returned handle must be freed with `bizlens_session_free`.
#[no_mangle]
pub unsafe extern "C" fn bizlens_session_from_csv(csv_data: *const c_char) -> *mut BizlensSession {
    guard("bizlens_session_from_csv", ptr::null_mut(), || {
        let Ok(csv) = (unsafe { read_str(csv_data, "csv_data") }) else {
            return ptr::null_mut();
        };
        let mut session = Session::default();
        match session.load_csv(csv) {
            Ok(_) => Box::into_raw(Box::new(BizlensSession { session })),
            Err(e) => {
                set_last_error(&format!("CSV parse error: {e}"));
                ptr::null_mut()
            }
        }
    })
}

/// Replaces the session's dataset with new CSV text.
///
/// On failure the previous dataset stays current.
///
/// # Safety
/// `handle` must be a valid session; `csv_data` a valid C string.
#[no_mangle]
pub unsafe extern "C" fn bizlens_session_load_csv(
    handle: *mut BizlensSession,
    csv_data: *const c_char,
) -> i32 {
    guard("bizlens_session_load_csv", BIZLENS_ERR_PANIC, || {
        if handle.is_null() {
            set_last_error("null session handle");
            return BIZLENS_ERR_NULL_PTR;
        }
        let csv = match unsafe { read_str(csv_data, "csv_data") } {
            Ok(s) => s,
            Err(code) => return code,
        };
        let handle = unsafe { &mut *handle };
        match handle.session.load_csv(csv) {
            Ok(_) => BIZLENS_OK,
            Err(e) => {
                set_last_error(&format!("CSV parse error: {e}"));
                error_code(&e)
            }
        }
    })
}

/// Frees a session.
///
/// # Safety
/// `handle` must come from `bizlens_session_from_csv`, or be null.
#[no_mangle]
pub unsafe extern "C" fn bizlens_session_free(handle: *mut BizlensSession) {
    guard("bizlens_session_free", (), || {
        if !handle.is_null() {
            drop(unsafe { Box::from_raw(handle) });
        }
    })
}

/// Runs `f` against the session behind `handle`, reporting errors through
/// the last-error slot.
///
/// # Safety
/// `handle` must be a valid session or null.
unsafe fn with_session<T>(
    handle: *const BizlensSession,
    fallback: T,
    f: impl FnOnce(&Session) -> Result<T, Error>,
) -> T {
    if handle.is_null() {
        set_last_error("null session handle");
        return fallback;
    }
    let handle = unsafe { &*handle };
    match f(&handle.session) {
        Ok(value) => value,
        Err(e) => {
            set_last_error(&e.to_string());
            fallback
        }
    }
}

/// Returns the number of rows in the current dataset, or -1 on error.
///
/// # Safety
/// `handle` must be a valid session or null.
#[no_mangle]
pub unsafe extern "C" fn bizlens_row_count(handle: *const BizlensSession) -> i64 {
    guard("bizlens_row_count", -1, || {
        unsafe { with_session(handle, -1, |s| Ok(s.current()?.row_count() as i64)) }
    })
}

/// Returns the number of columns in the current dataset, or -1 on error.
///
/// # Safety
/// `handle` must be a valid session or null.
#[no_mangle]
pub unsafe extern "C" fn bizlens_col_count(handle: *const BizlensSession) -> i64 {
    guard("bizlens_col_count", -1, || {
        unsafe { with_session(handle, -1, |s| Ok(s.current()?.column_count() as i64)) }
    })
}

// ── JSON reports ─────────────────────────────────────────────────────

/// Profile report of the current dataset as JSON, or null on error.
///
/// # Safety
/// `handle` must be a valid session or null. Free the result with
/// `bizlens_string_free`.
#[no_mangle]
pub unsafe extern "C" fn bizlens_profile_json(handle: *const BizlensSession) -> *mut c_char {
    guard("bizlens_profile_json", ptr::null_mut(), || {
        unsafe { with_session(handle, ptr::null_mut(), |s| Ok(to_json_ptr(&s.profile()?))) }
    })
}

/// Insight report of the current dataset as JSON (with a `text` field
/// holding the rendered narrative), or null on error.
///
/// # Safety
/// `handle` must be a valid session or null. Free the result with
/// `bizlens_string_free`.
#[no_mangle]
pub unsafe extern "C" fn bizlens_insights_json(handle: *const BizlensSession) -> *mut c_char {
    #[derive(Serialize)]
    struct Doc {
        #[serde(flatten)]
        report: crate::insights::InsightReport,
        text: String,
    }
    guard("bizlens_insights_json", ptr::null_mut(), || {
        unsafe {
            with_session(handle, ptr::null_mut(), |s| {
                let report = s.insights()?;
                let text = report.text();
                Ok(to_json_ptr(&Doc { report, text }))
            })
        }
    })
}

/// Dataset info (shape, kinds, memory) as JSON, or null on error.
///
/// # Safety
/// `handle` must be a valid session or null. Free the result with
/// `bizlens_string_free`.
#[no_mangle]
pub unsafe extern "C" fn bizlens_info_json(handle: *const BizlensSession) -> *mut c_char {
    guard("bizlens_info_json", ptr::null_mut(), || {
        unsafe { with_session(handle, ptr::null_mut(), |s| Ok(to_json_ptr(&s.info()?))) }
    })
}

/// Applies a JSON filter spec to the current dataset.
///
/// Returns `{"matched":…,"total":…,"message":…}` as JSON, or null on
/// error. When `adopt` is non-zero the filtered table becomes current.
///
/// # Safety
/// `handle` must be a valid session; `spec_json` a valid C string. Free
/// the result with `bizlens_string_free`.
#[no_mangle]
pub unsafe extern "C" fn bizlens_filter_json(
    handle: *mut BizlensSession,
    spec_json: *const c_char,
    adopt: i32,
) -> *mut c_char {
    #[derive(Serialize)]
    struct Doc {
        matched: usize,
        total: usize,
        message: String,
    }
    guard("bizlens_filter_json", ptr::null_mut(), || {
        if handle.is_null() {
            set_last_error("null session handle");
            return ptr::null_mut();
        }
        let Ok(json) = (unsafe { read_str(spec_json, "spec_json") }) else {
            return ptr::null_mut();
        };
        let spec: FilterSpec = match serde_json::from_str(json) {
            Ok(spec) => spec,
            Err(e) => {
                set_last_error(&format!("invalid filter spec: {e}"));
                return ptr::null_mut();
            }
        };
        let handle = unsafe { &mut *handle };
        let outcome = match handle.session.filter(&spec) {
            Ok(outcome) => outcome,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        };
        let doc = Doc {
            matched: outcome.matched,
            total: outcome.total,
            message: outcome.message(),
        };
        if adopt != 0 {
            handle.session.adopt(outcome);
        }
        to_json_ptr(&doc)
    })
}

/// Frees a string returned by this library.
///
/// # Safety
/// `s` must come from a `bizlens_*_json` function, or be null.
#[no_mangle]
pub unsafe extern "C" fn bizlens_string_free(s: *mut c_char) {
    guard("bizlens_string_free", (), || {
        if !s.is_null() {
            drop(unsafe { CString::from_raw(s) });
        }
    })
}

// ── Version ──────────────────────────────────────────────────────────

/// Returns the version string of u-bizlens.
///
/// # Safety
/// The returned string is a static string literal. Do not free it.
#[no_mangle]
pub extern "C" fn bizlens_version() -> *const c_char {
    c"0.1.0".as_ptr()
}
