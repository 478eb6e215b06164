//! Request validation utilities for the keysmith API.
//!
//! Presence checks follow the service's long-standing rule: a field that is
//! absent, `null` or an empty/whitespace-only string counts as missing.

use std::fmt;

use crate::license_key::is_valid_key_format;

/// Validation error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn missing(field_name: &str) -> ValidationError {
    ValidationError {
        field: field_name.to_string(),
        message: "field is required".to_string(),
    }
}

/// Require a non-blank string and return it untrimmed.
///
/// # Example
/// ```
/// use keysmith::server::validation::require_text;
///
/// assert_eq!(require_text(Some("abc"), "scriptId").unwrap(), "abc");
/// assert!(require_text(Some("   "), "scriptId").is_err());
/// assert!(require_text(None, "scriptId").is_err());
/// ```
pub fn require_text<'a>(value: Option<&'a str>, field_name: &str) -> ValidationResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(missing(field_name)),
    }
}

/// Require a user id. `0` is not a user and counts as missing, the same as
/// an absent or `null` value.
pub fn require_user_id(value: Option<i64>, field_name: &str) -> ValidationResult<i64> {
    match value {
        Some(id) if id != 0 => Ok(id),
        _ => Err(missing(field_name)),
    }
}

/// Validate a license key format (`XXXX-XXXX-XXXX-XXXX`).
///
/// # Example
/// ```
/// use keysmith::server::validation::validate_license_key;
///
/// assert!(validate_license_key("AB3D-EFGH-J2K4-MNPQ", "key").is_ok());
/// assert!(validate_license_key("invalid", "key").is_err());
/// ```
pub fn validate_license_key(value: &str, field_name: &str) -> ValidationResult<()> {
    if is_valid_key_format(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "invalid license key format (expected: XXXX-XXXX-XXXX-XXXX)".to_string(),
        })
    }
}
