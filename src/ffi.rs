//! FFI bindings for Synheart Focus
//!
//! This module provides C-compatible functions for driving the engine from other
//! languages. The host gathers detector, audio and frame data itself and passes
//! each tick in as a JSON `TickSample`. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `focus_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::encoder::{ReportEncoder, SessionMeta};
use crate::engine::SessionEngine;
use crate::report::{fallback_analysis, parse_analysis};
use crate::types::{GeoLocation, TickSample};

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

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a value to a newly allocated C string, or NULL with the error set
fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
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

/// Opaque handle to a session engine
pub struct FocusEngineHandle {
    engine: SessionEngine,
    meta: Option<SessionMeta>,
    encoder: ReportEncoder,
}

impl FocusEngineHandle {
    fn active(&mut self) -> Option<&mut SessionEngine> {
        if self.meta.is_some() {
            Some(&mut self.engine)
        } else {
            set_last_error("No active session");
            None
        }
    }
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer that must be freed with `focus_engine_free`.
/// - Returns NULL on error; call `focus_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_new(config_json: *const c_char) -> *mut FocusEngineHandle {
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
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match SessionEngine::new(config) {
        Ok(engine) => Box::into_raw(Box::new(FocusEngineHandle {
            engine,
            meta: None,
            encoder: ReportEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_free(handle: *mut FocusEngineHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Start a fresh session, resetting all counters and histories.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`.
/// - Returns session metadata JSON that must be freed with `focus_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_start(handle: *mut FocusEngineHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &mut *handle;

    if handle.meta.is_some() {
        set_last_error("A session is already active");
        return ptr::null_mut();
    }

    handle.engine.reset();
    let meta = SessionMeta::new_now();
    handle.meta = Some(meta);
    json_to_cstr(&meta)
}

/// Attach a location to the active session. Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_set_location(
    handle: *mut FocusEngineHandle,
    latitude: f64,
    longitude: f64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    match (&mut *handle).active() {
        Some(engine) => {
            engine.set_location(GeoLocation {
                latitude,
                longitude,
            });
            0
        }
        None => -1,
    }
}

/// Process one tick and return the emitted events as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`.
/// - `sample_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
/// - Returns NULL on error; call `focus_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_tick(
    handle: *mut FocusEngineHandle,
    sample_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let json = match cstr_to_string(sample_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid sample string pointer");
            return ptr::null_mut();
        }
    };

    let sample: TickSample = match serde_json::from_str(&json) {
        Ok(sample) => sample,
        Err(e) => {
            set_last_error(&format!("Invalid tick sample: {e}"));
            return ptr::null_mut();
        }
    };

    match (&mut *handle).active() {
        Some(engine) => json_to_cstr(&engine.tick(sample)),
        None => ptr::null_mut(),
    }
}

/// Live metrics at session time `now_ms`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`.
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_live(handle: *mut FocusEngineHandle, now_ms: u64) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    json_to_cstr(&(*handle).engine.live_metrics(now_ms))
}

/// Derived session statistics at session time `now_ms`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`.
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_stats(handle: *mut FocusEngineHandle, now_ms: u64) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    json_to_cstr(&(*handle).engine.calculate_stats(now_ms))
}

/// Snapshot history as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`.
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_snapshots(handle: *mut FocusEngineHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    json_to_cstr(&(*handle).engine.snapshots())
}

/// Stop the session and return the session report JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `focus_engine_new`.
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
/// - Returns NULL on error; call `focus_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn focus_engine_stop(handle: *mut FocusEngineHandle, now_ms: u64) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &mut *handle;

    let Some(meta) = handle.meta.take() else {
        set_last_error("No active session");
        return ptr::null_mut();
    };
    json_to_cstr(&handle.encoder.encode(&meta, &handle.engine, now_ms))
}

// ============================================================================
// Analysis API
// ============================================================================

/// The fixed analysis payload used when summarization fails.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
#[no_mangle]
pub unsafe extern "C" fn focus_analysis_fallback() -> *mut c_char {
    clear_last_error();
    json_to_cstr(&fallback_analysis())
}

/// Parse a summarization model response into analysis JSON.
///
/// # Safety
/// - `text` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `focus_free_string`.
/// - Returns NULL if the response cannot be parsed; callers should then use
///   `focus_analysis_fallback`.
#[no_mangle]
pub unsafe extern "C" fn focus_parse_analysis(text: *const c_char) -> *mut c_char {
    clear_last_error();

    let text = match cstr_to_string(text) {
        Some(s) => s,
        None => {
            set_last_error("Invalid text string pointer");
            return ptr::null_mut();
        }
    };

    match parse_analysis(&text) {
        Ok(analysis) => json_to_cstr(&analysis),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by Focus functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Focus function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn focus_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Focus function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn focus_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Focus library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn focus_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
