//! FFI bindings for the kinetic blueprint engine
//!
//! This module provides C-compatible functions for calling the engine from
//! mobile hosts. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `kinetic_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::error::AssessmentError;
use crate::index::EngineStores;
use crate::pipeline::{assess_json, AssessmentRequest, KineticEngine};
use crate::proof;
use crate::report::SubmissionReport;
use crate::types::Assessment;

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

/// NULL means default configuration
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<EngineConfig, AssessmentError> {
    match cstr_to_string(config_json) {
        Some(json) => EngineConfig::from_json(&json),
        None => Ok(EngineConfig::default()),
    }
}

/// Report a result as a C string, or NULL with the last error set
fn into_cstr(result: Result<String, AssessmentError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Assess one recording and return the assessment JSON.
///
/// The replay check runs against an empty index and no signature is recorded.
///
/// # Safety
/// - `input_json` and `athlete_id` must be valid null-terminated C strings.
/// - `config_json` may be NULL for the default configuration.
/// - Returns a newly allocated string that must be freed with `kinetic_free_string`.
/// - Returns NULL on error; call `kinetic_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kinetic_assess(
    input_json: *const c_char,
    athlete_id: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(input) = cstr_to_string(input_json) else {
        set_last_error("Invalid input JSON string pointer");
        return ptr::null_mut();
    };
    let Some(athlete) = cstr_to_string(athlete_id) else {
        set_last_error("Invalid athlete_id string pointer");
        return ptr::null_mut();
    };

    into_cstr(
        config_from_ptr(config_json)
            .and_then(|config| assess_json(&input, &AssessmentRequest::new(athlete), &config)),
    )
}

/// Recompute an assessment's proof hash and compare.
///
/// # Safety
/// - `assessment_json` must be a valid null-terminated C string.
/// - Returns 1 if the proof verifies, 0 if it does not, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn kinetic_verify(assessment_json: *const c_char) -> i32 {
    clear_last_error();

    let Some(json) = cstr_to_string(assessment_json) else {
        set_last_error("Invalid assessment JSON string pointer");
        return -1;
    };

    match serde_json::from_str::<Assessment>(&json) {
        Ok(assessment) => i32::from(proof::verify(&assessment)),
        Err(e) => {
            set_last_error(&AssessmentError::from(e).to_string());
            -1
        }
    }
}

/// Verify an athlete's chronologically ordered assessments (JSON array).
///
/// # Safety
/// - `assessments_json` must be a valid null-terminated C string.
/// - Returns 1 if the chain verifies, 0 if it does not, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn kinetic_verify_chain(assessments_json: *const c_char) -> i32 {
    clear_last_error();

    let Some(json) = cstr_to_string(assessments_json) else {
        set_last_error("Invalid assessments JSON string pointer");
        return -1;
    };

    match serde_json::from_str::<Vec<Assessment>>(&json) {
        Ok(records) => i32::from(proof::verify_chain(&records)),
        Err(e) => {
            set_last_error(&AssessmentError::from(e).to_string());
            -1
        }
    }
}

/// Build the submission report (ranking, feedback, badges) for an assessment.
///
/// # Safety
/// - `assessment_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `kinetic_free_string`.
/// - Returns NULL on error; call `kinetic_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kinetic_report(assessment_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json) = cstr_to_string(assessment_json) else {
        set_last_error("Invalid assessment JSON string pointer");
        return ptr::null_mut();
    };

    into_cstr(report_json(&json))
}

fn report_json(assessment_json: &str) -> Result<String, AssessmentError> {
    let assessment: Assessment = serde_json::from_str(assessment_json)?;
    let report = SubmissionReport::from_assessment(&assessment);
    Ok(serde_json::to_string(&report)?)
}

// ============================================================================
// Stateful Engine API
// ============================================================================

/// Opaque handle to a KineticEngine and its stores
pub struct KineticEngineHandle {
    engine: KineticEngine,
    stores: EngineStores,
}

/// Create an engine.
///
/// # Safety
/// - `config_json` may be NULL for the default configuration.
/// - `state_json` may be NULL for empty stores, otherwise it must be a string
///   previously returned by `kinetic_engine_save_state`.
/// - Must be freed with `kinetic_engine_free`.
/// - Returns NULL on error; call `kinetic_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kinetic_engine_new(
    config_json: *const c_char,
    state_json: *const c_char,
) -> *mut KineticEngineHandle {
    clear_last_error();

    let result = config_from_ptr(config_json).and_then(|config| {
        let stores = match cstr_to_string(state_json) {
            Some(json) => EngineStores::from_json(&json)?,
            None => EngineStores::new(),
        };
        let engine = KineticEngine::with_stores(config, &stores)?;
        Ok(KineticEngineHandle { engine, stores })
    });

    match result {
        Ok(handle) => Box::into_raw(Box::new(handle)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `kinetic_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn kinetic_engine_free(engine: *mut KineticEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Submit a recording: assess, claim its signature, extend the athlete's chain.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `kinetic_engine_new`.
/// - `input_json` and `athlete_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `kinetic_free_string`.
/// - Returns NULL on error; call `kinetic_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kinetic_engine_submit(
    engine: *const KineticEngineHandle,
    input_json: *const c_char,
    athlete_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let Some(input) = cstr_to_string(input_json) else {
        set_last_error("Invalid input JSON string pointer");
        return ptr::null_mut();
    };
    let Some(athlete) = cstr_to_string(athlete_id) else {
        set_last_error("Invalid athlete_id string pointer");
        return ptr::null_mut();
    };

    into_cstr(handle.engine.submit_json(&input, &athlete))
}

/// Save the engine's signature index and hash ledger to JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `kinetic_engine_new`.
/// - Returns a newly allocated string that must be freed with `kinetic_free_string`.
/// - Returns NULL on error; call `kinetic_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kinetic_engine_save_state(
    engine: *const KineticEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    into_cstr(handle.stores.to_json().map_err(AssessmentError::from))
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
pub unsafe extern "C" fn kinetic_free_string(ptr: *mut c_char) {
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
pub unsafe extern "C" fn kinetic_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn kinetic_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssessmentInput, Joint, Keypoint, PoseFrame, TestType};
    use std::ffi::CString;

    /// Four push-ups at 30 fps over 4 seconds
    fn push_up_json() -> CString {
        let frames = (0..120u32)
            .map(|i| {
                let t = i as f64 / 30.0;
                // Elbow drops from straight to bent twice
                let bend = (std::f64::consts::PI * t).sin().abs() * 0.25;
                PoseFrame::new(i, t)
                    .with_keypoint(Joint::RightShoulder, Keypoint::new(0.0, 0.0, 0.9))
                    .with_keypoint(Joint::RightElbow, Keypoint::new(bend, 0.3, 0.9))
                    .with_keypoint(Joint::RightWrist, Keypoint::new(0.0, 0.6, 0.9))
            })
            .collect();
        let input = AssessmentInput {
            test_type: TestType::PushUp,
            declared_duration_seconds: 4.0,
            distance_meters: None,
            frames,
        };
        CString::new(serde_json::to_string(&input).unwrap()).unwrap()
    }

    #[test]
    fn test_ffi_assess_and_verify() {
        let input = push_up_json();
        let athlete = CString::new("athlete-1").unwrap();

        unsafe {
            let result = kinetic_assess(input.as_ptr(), athlete.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let json = CStr::from_ptr(result).to_str().unwrap();
            assert!(json.contains("\"proofChain\""));
            assert_eq!(kinetic_verify(result), 1);

            let report = kinetic_report(result);
            assert!(!report.is_null());
            assert!(CStr::from_ptr(report).to_str().unwrap().contains("\"badges\""));

            kinetic_free_string(report);
            kinetic_free_string(result);
        }
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        let input = push_up_json();
        let athlete = CString::new("athlete-1").unwrap();

        unsafe {
            let engine = kinetic_engine_new(ptr::null(), ptr::null());
            assert!(!engine.is_null());

            let first = kinetic_engine_submit(engine, input.as_ptr(), athlete.as_ptr());
            assert!(!first.is_null());

            let state = kinetic_engine_save_state(engine);
            assert!(!state.is_null());

            // A restored engine still remembers the clip
            let restored = kinetic_engine_new(ptr::null(), state);
            assert!(!restored.is_null());
            let second = kinetic_engine_submit(restored, input.as_ptr(), athlete.as_ptr());
            assert!(!second.is_null());
            let second_json = CStr::from_ptr(second).to_str().unwrap();
            assert!(second_json.contains("replayed_signature"));

            let chain = format!(
                "[{},{}]",
                CStr::from_ptr(first).to_str().unwrap(),
                second_json
            );
            let chain = CString::new(chain).unwrap();
            assert_eq!(kinetic_verify_chain(chain.as_ptr()), 1);

            kinetic_free_string(first);
            kinetic_free_string(second);
            kinetic_free_string(state);
            kinetic_engine_free(engine);
            kinetic_engine_free(restored);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid = CString::new("not json").unwrap();
        let athlete = CString::new("athlete-1").unwrap();

        unsafe {
            let result = kinetic_assess(invalid.as_ptr(), athlete.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = kinetic_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert_eq!(kinetic_verify(invalid.as_ptr()), -1);

            let bad_config = CString::new(r#"{"scoring":{"cheatPenalty":5}}"#).unwrap();
            assert!(kinetic_engine_new(bad_config.as_ptr(), ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = kinetic_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
