//! FFI bindings for Trendline
//!
//! This module provides C-compatible functions for calling Trendline from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `trend_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::encoder::ResponseEncoder;
use crate::error::ComputeError;
use crate::export::{CsvExporter, ExportKind};
use crate::pipeline::{compute_measurements, compute_response, TrendProcessor};
use crate::types::{ProfileParameters, SourceSnapshot};
use crate::units::WeightUnit;

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

/// Parse a snapshot and an optional profile. A NULL profile means defaults.
unsafe fn read_inputs(
    snapshot_json: *const c_char,
    profile_json: *const c_char,
) -> Result<(SourceSnapshot, ProfileParameters), String> {
    let snapshot_str =
        cstr_to_string(snapshot_json).ok_or_else(|| "Invalid snapshot string pointer".to_string())?;
    let snapshot: SourceSnapshot = serde_json::from_str(&snapshot_str)
        .map_err(|e| ComputeError::from(e).to_string())?;

    let profile = if profile_json.is_null() {
        ProfileParameters::default()
    } else {
        let profile_str = cstr_to_string(profile_json)
            .ok_or_else(|| "Invalid profile string pointer".to_string())?;
        serde_json::from_str(&profile_str).map_err(|e| ComputeError::from(e).to_string())?
    };

    Ok((snapshot, profile))
}

fn finish(result: Result<String, String>) -> *mut c_char {
    match result {
        Ok(s) => string_to_cstr(&s),
        Err(msg) => {
            set_last_error(&msg);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute a `MeasurementsResponse` JSON from a snapshot JSON.
///
/// # Safety
/// - `snapshot_json` must be a valid null-terminated C string.
/// - `profile_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `trend_free_string`.
/// - Returns NULL on error; call `trend_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn trend_compute_json(
    snapshot_json: *const c_char,
    profile_json: *const c_char,
    is_me: bool,
) -> *mut c_char {
    clear_last_error();

    finish(read_inputs(snapshot_json, profile_json).and_then(|(snapshot, profile)| {
        let response = compute_response(&snapshot, &profile, is_me).map_err(|e| e.to_string())?;
        ResponseEncoder::new()
            .encode_to_json(&response)
            .map_err(|e| e.to_string())
    }))
}

/// Export a snapshot as CSV.
///
/// `kind` is `computed` or `raw:<provider>`. Weights are written in the
/// profile's display unit.
///
/// # Safety
/// - `snapshot_json` and `kind` must be valid null-terminated C strings.
/// - `profile_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `trend_free_string`.
/// - Returns NULL on error; call `trend_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn trend_export_csv(
    snapshot_json: *const c_char,
    profile_json: *const c_char,
    kind: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let kind = match cstr_to_string(kind) {
        Some(s) => s,
        None => {
            set_last_error("Invalid kind string pointer");
            return ptr::null_mut();
        }
    };

    finish(read_inputs(snapshot_json, profile_json).and_then(|(snapshot, profile)| {
        let kind: ExportKind = kind.parse().map_err(|e: ComputeError| e.to_string())?;
        let points = match kind {
            ExportKind::Computed => {
                compute_measurements(&snapshot.sources, &profile).map_err(|e| e.to_string())?
            }
            ExportKind::Raw(_) => Vec::new(),
        };
        CsvExporter::new(WeightUnit::for_profile(&profile))
            .export(&kind, &snapshot, &points)
            .map_err(|e| e.to_string())
    }))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a TrendProcessor
pub struct TrendProcessorHandle {
    processor: TrendProcessor,
}

/// Create a new TrendProcessor for a profile.
///
/// # Safety
/// - `profile_json` must be a valid null-terminated C string or NULL for defaults.
/// - Must be freed with `trend_processor_free`.
/// - Returns NULL on error; call `trend_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn trend_processor_new(
    profile_json: *const c_char,
) -> *mut TrendProcessorHandle {
    clear_last_error();

    let profile = if profile_json.is_null() {
        ProfileParameters::default()
    } else {
        let parsed = cstr_to_string(profile_json)
            .ok_or_else(|| "Invalid profile string pointer".to_string())
            .and_then(|s| serde_json::from_str::<ProfileParameters>(&s).map_err(|e| ComputeError::from(e).to_string()));
        match parsed {
            Ok(profile) => profile,
            Err(msg) => {
                set_last_error(&msg);
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(TrendProcessorHandle {
        processor: TrendProcessor::new(profile),
    });
    Box::into_raw(handle)
}

/// Free a TrendProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `trend_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn trend_processor_free(processor: *mut TrendProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Compute a response with a stateful processor. Repeated identical snapshots
/// are served from the processor's cache.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `trend_processor_new`.
/// - `snapshot_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `trend_free_string`.
/// - Returns NULL on error; call `trend_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn trend_processor_compute(
    processor: *mut TrendProcessorHandle,
    snapshot_json: *const c_char,
    is_me: bool,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let snapshot_str = match cstr_to_string(snapshot_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid snapshot string pointer");
            return ptr::null_mut();
        }
    };

    finish(
        serde_json::from_str::<SourceSnapshot>(&snapshot_str)
            .map_err(ComputeError::from)
            .and_then(|snapshot| handle.processor.respond(&snapshot, is_me))
            .and_then(|response| ResponseEncoder::new().encode_to_json(&response))
            .map_err(|e| e.to_string()),
    )
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Trendline functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Trendline function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn trend_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Trendline function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn trend_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Trendline library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn trend_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_snapshot() -> CString {
        CString::new(
            r#"{
            "sources": [
                { "source": "fitbit", "lastUpdate": "2024-01-04T12:00:00Z",
                  "measurements": [ { "date": "2024-01-01", "weight": 70.0 } ] },
                { "source": "withings", "lastUpdate": "2024-01-05T12:00:00Z",
                  "measurements": [ { "date": "2024-01-03", "time": "07:30:00", "weight": 71.0 } ] }
            ],
            "providerStatus": { "withings": { "success": true } }
        }"#,
        )
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        trend_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_compute_json() {
        let snapshot = sample_snapshot();
        unsafe {
            let out = take_string(trend_compute_json(snapshot.as_ptr(), ptr::null(), true));
            let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();

            assert_eq!(parsed["isMe"], true);
            assert_eq!(parsed["computedMeasurements"].as_array().unwrap().len(), 3);
            assert_eq!(parsed["computedMeasurements"][1]["weightIsInterpolated"], true);
            assert_eq!(parsed["providerStatus"]["withings"]["success"], true);
        }
    }

    #[test]
    fn test_ffi_export_csv() {
        let snapshot = sample_snapshot();
        let profile = CString::new(r#"{ "useMetric": false }"#).unwrap();
        let computed = CString::new("computed").unwrap();
        let raw = CString::new("raw:withings").unwrap();
        unsafe {
            let csv = take_string(trend_export_csv(
                snapshot.as_ptr(),
                profile.as_ptr(),
                computed.as_ptr(),
            ));
            assert_eq!(csv.lines().count(), 4);
            assert!(csv.lines().nth(1).unwrap().starts_with("2024-01-01,154.32,No,154.32"));

            let csv = take_string(trend_export_csv(snapshot.as_ptr(), ptr::null(), raw.as_ptr()));
            assert_eq!(csv.lines().nth(1), Some("2024-01-03,07:30:00,71.00,"));
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        let snapshot = sample_snapshot();
        unsafe {
            let processor = trend_processor_new(ptr::null());
            assert!(!processor.is_null());

            let first = take_string(trend_processor_compute(processor, snapshot.as_ptr(), false));
            let second = take_string(trend_processor_compute(processor, snapshot.as_ptr(), false));
            let first: serde_json::Value = serde_json::from_str(&first).unwrap();
            let second: serde_json::Value = serde_json::from_str(&second).unwrap();
            assert_eq!(first["computedMeasurements"], second["computedMeasurements"]);
            assert_eq!((*processor).processor.cache_hits(), 1);

            trend_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let empty = CString::new(r#"{ "sources": [] }"#).unwrap();
        let invalid = CString::new("not json").unwrap();
        let bad_kind = CString::new("trend").unwrap();
        unsafe {
            assert!(trend_compute_json(empty.as_ptr(), ptr::null(), false).is_null());
            let error = CStr::from_ptr(trend_last_error()).to_str().unwrap();
            assert!(error.contains("No measurements"));

            assert!(trend_compute_json(invalid.as_ptr(), ptr::null(), false).is_null());
            assert!(!trend_last_error().is_null());

            assert!(trend_export_csv(sample_snapshot().as_ptr(), ptr::null(), bad_kind.as_ptr()).is_null());
            assert!(!trend_last_error().is_null());

            assert!(trend_compute_json(ptr::null(), ptr::null(), false).is_null());
            assert!(trend_processor_compute(ptr::null_mut(), empty.as_ptr(), false).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(trend_version()).to_str().unwrap();
            assert_eq!(version, crate::TRENDLINE_VERSION);
        }
    }
}
