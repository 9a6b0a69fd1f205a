//! FFI bindings for the Smart Orb engine
//!
//! This module provides C-compatible functions for driving a session from other
//! languages (the dashboard collaborator). All payloads are JSON C strings
//! (null-terminated); returned strings are newly allocated and must be freed
//! by the caller using `orb_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::schema::SensorReading;
use crate::session::{SessionManager, SessionRequest};
use crate::stimulation::ParameterOverrides;
use crate::summary::PerformanceMetrics;
use crate::types::UserProfile;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Record an error; session errors are prefixed with their stable code
fn record_error(err: &ComputeError) {
    match err {
        ComputeError::Session(session) => {
            set_last_error(&format!("{}: {}", session.code(), session))
        }
        other => set_last_error(&other.to_string()),
    }
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ComputeError> {
    serde_json::to_string(value).map_err(|e| ComputeError::EncodingError(e.to_string()))
}

/// Run `f` against the handle and hand its JSON result back as a C string
unsafe fn call_with_handle<F>(engine: *mut OrbEngineHandle, f: F) -> *mut c_char
where
    F: FnOnce(&mut SessionManager) -> Result<String, ComputeError>,
{
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;
    match f(&mut handle.manager) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            record_error(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Engine Handle
// ============================================================================

/// Opaque handle to a SessionManager
pub struct OrbEngineHandle {
    manager: SessionManager,
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` may be NULL (defaults) or a valid null-terminated C string
///   holding an `EngineConfig` JSON object.
/// - Returns a pointer that must be freed with `orb_engine_free`.
/// - Returns NULL on error; call `orb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn orb_engine_new(config_json: *const c_char) -> *mut OrbEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                record_error(&e);
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(OrbEngineHandle {
        manager: SessionManager::new(config),
    });
    Box::into_raw(handle)
}

/// Free an engine, discarding any active session.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn orb_engine_free(engine: *mut OrbEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Set the user profile for subsequent sessions.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`.
/// - `profile_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn orb_set_profile(
    engine: *mut OrbEngineHandle,
    profile_json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;

    let json = match cstr_to_string(profile_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid profile string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<UserProfile>(&json) {
        Ok(profile) => {
            handle.manager.set_profile(profile);
            0
        }
        Err(e) => {
            record_error(&ComputeError::from(e));
            -1
        }
    }
}

// ============================================================================
// Session Control
// ============================================================================

/// Start a session and return the session descriptor JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`.
/// - `request_json` may be NULL (auto-detect everything) or a valid
///   null-terminated C string holding a `SessionRequest` JSON object.
/// - Returns a newly allocated string that must be freed with `orb_free_string`.
/// - Returns NULL on error; call `orb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn orb_session_start(
    engine: *mut OrbEngineHandle,
    request_json: *const c_char,
) -> *mut c_char {
    let request = if request_json.is_null() {
        Some(String::from("{}"))
    } else {
        cstr_to_string(request_json)
    };

    call_with_handle(engine, |manager| {
        let json = request.ok_or_else(|| {
            ComputeError::ParseError("Invalid request string pointer".to_string())
        })?;
        let request: SessionRequest = serde_json::from_str(&json)?;
        to_json(&manager.start(request)?)
    })
}

/// Process one `orb.sensor_reading.v1` reading and return the snapshot JSON.
///
/// Any well-formed reading is accepted, including one with only a timestamp;
/// implausible values are dropped as absent.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`.
/// - `reading_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `orb_free_string`.
/// - Returns NULL on error; call `orb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn orb_process_reading(
    engine: *mut OrbEngineHandle,
    reading_json: *const c_char,
) -> *mut c_char {
    let reading = cstr_to_string(reading_json);

    call_with_handle(engine, |manager| {
        let json = reading.ok_or_else(|| {
            ComputeError::ParseError("Invalid reading string pointer".to_string())
        })?;
        let reading: SensorReading = serde_json::from_str(&json)?;
        to_json(&manager.process_sample(reading.to_sample())?)
    })
}

/// Enable (non-zero) or disable (zero) stimulation.
///
/// Returns the current parameter set JSON, or the JSON literal `null` when
/// disabling.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`.
/// - Returns a newly allocated string that must be freed with `orb_free_string`.
/// - Returns NULL on error; call `orb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn orb_toggle_stimulation(
    engine: *mut OrbEngineHandle,
    enable: i32,
) -> *mut c_char {
    call_with_handle(engine, |manager| {
        to_json(&manager.toggle_stimulation(enable != 0)?)
    })
}

/// Apply manual overrides and return the updated parameter set JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`.
/// - `overrides_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `orb_free_string`.
/// - Returns NULL on error; call `orb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn orb_adjust(
    engine: *mut OrbEngineHandle,
    overrides_json: *const c_char,
) -> *mut c_char {
    let overrides = cstr_to_string(overrides_json);

    call_with_handle(engine, |manager| {
        let json = overrides.ok_or_else(|| {
            ComputeError::ParseError("Invalid overrides string pointer".to_string())
        })?;
        let overrides: ParameterOverrides = serde_json::from_str(&json)?;
        to_json(&manager.adjust(&overrides)?)
    })
}

/// Score operator-reported performance metrics and return the score as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`.
/// - `metrics_json` may be NULL (default score) or a valid null-terminated C
///   string holding a `PerformanceMetrics` JSON object.
/// - Returns a newly allocated string that must be freed with `orb_free_string`.
/// - Returns NULL on error; call `orb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn orb_evaluate_effectiveness(
    engine: *mut OrbEngineHandle,
    metrics_json: *const c_char,
) -> *mut c_char {
    let metrics = if metrics_json.is_null() {
        Some(String::from("{}"))
    } else {
        cstr_to_string(metrics_json)
    };

    call_with_handle(engine, |manager| {
        let json = metrics.ok_or_else(|| {
            ComputeError::ParseError("Invalid metrics string pointer".to_string())
        })?;
        let metrics: PerformanceMetrics = serde_json::from_str(&json)?;
        to_json(&manager.evaluate_effectiveness(&metrics)?)
    })
}

/// End the session and return the summary JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `orb_engine_new`.
/// - Returns a newly allocated string that must be freed with `orb_free_string`.
/// - Returns NULL on error; call `orb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn orb_session_end(engine: *mut OrbEngineHandle) -> *mut c_char {
    call_with_handle(engine, |manager| to_json(&manager.end()?))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an engine function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn orb_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next engine call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn orb_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn orb_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
