//! Standardized API error responses for all keysmith endpoints.
//!
//! All error responses follow this JSON structure:
//!
//! ```json
//! {
//!   "success": false,
//!   "error": "Invalid key",
//!   "code": "LICENSE_NOT_FOUND"
//! }
//! ```
//!
//! `error` carries the human-readable message clients have always received;
//! `code` is stable and meant for programmatic handling.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::api::ErrorResponse;
use crate::errors::LicenseError;
use crate::server::auth::AuthError;

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request payload is malformed
    InvalidRequest,
    /// A required field is missing
    MissingField,
    /// Admin credential missing, rejected or lacking permission
    Unauthorized,
    /// License key was not found
    LicenseNotFound,
    /// License was activated earlier
    AlreadyActivated,
    /// Database operation failed
    DatabaseError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Re-activation is a 400, not a 409.
            ErrorCode::InvalidRequest | ErrorCode::MissingField | ErrorCode::AlreadyActivated => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::LicenseNotFound => StatusCode::NOT_FOUND,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Invalid request body",
            ErrorCode::MissingField => "A required field is missing",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::LicenseNotFound => "Invalid key",
            ErrorCode::AlreadyActivated => "Already activated",
            ErrorCode::DatabaseError | ErrorCode::InternalError => "Server error",
        }
    }

    /// The SCREAMING_SNAKE_CASE wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::LicenseNotFound => "LICENSE_NOT_FOUND",
            ErrorCode::AlreadyActivated => "ALREADY_ACTIVATED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Standardized API error returned by every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    /// Creates a new API error with the code's default message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
        }
    }

    /// Creates a new API error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // === Convenience constructors for common errors ===

    /// Missing required field(s); `message` names them.
    pub fn missing_fields(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::MissingField, message)
    }

    /// Unknown or malformed license key.
    pub fn invalid_key() -> Self {
        Self::new(ErrorCode::LicenseNotFound)
    }

    /// License was activated earlier.
    pub fn already_activated() -> Self {
        Self::new(ErrorCode::AlreadyActivated)
    }

    /// Admin credential missing or rejected.
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    /// Internal server error (details stay in the server log).
    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            error: self.message,
            code: Some(self.code.as_str().to_string()),
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// === Conversions from existing error types ===

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        error!("request failed: {err}");
        match err {
            LicenseError::DatabaseError(_) | LicenseError::DuplicateKey(_) => {
                ApiError::new(ErrorCode::DatabaseError)
            }
            _ => ApiError::internal_error(),
        }
    }
}

/// Every rejected admin credential is a 401, including a valid token that
/// lacks the issuing scope. The reason stays in the server log.
impl From<AuthError> for ApiError {
    fn from(_err: AuthError) -> Self {
        ApiError::unauthorized()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("rejected request body: {}", rejection.body_text());
        ApiError::new(ErrorCode::InvalidRequest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(
            ErrorCode::MissingField.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::AlreadyActivated.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::LicenseNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn wire_names_match_serde() {
        for code in [
            ErrorCode::InvalidRequest,
            ErrorCode::MissingField,
            ErrorCode::Unauthorized,
            ErrorCode::LicenseNotFound,
            ErrorCode::AlreadyActivated,
            ErrorCode::DatabaseError,
            ErrorCode::InternalError,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn store_errors_hide_details() {
        let api_err: ApiError =
            LicenseError::DatabaseError("disk I/O error at /var/lib/x".to_string()).into();
        assert_eq!(api_err.code, ErrorCode::DatabaseError);
        assert_eq!(api_err.message, "Server error");

        let api_err: ApiError = LicenseError::DuplicateKey("AAAA-BBBB-CCCC-DDDD".into()).into();
        assert_eq!(api_err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api_err.message.contains("AAAA"));
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        let api_err: ApiError = AuthError::MissingCredential.into();
        assert_eq!(api_err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(api_err.message, "Unauthorized");

        let api_err: ApiError = AuthError::InvalidCredential.into();
        assert_eq!(api_err.status_code(), StatusCode::UNAUTHORIZED);

        let api_err: ApiError = AuthError::InsufficientScope("licenses:write".into()).into();
        assert_eq!(api_err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(api_err.code, ErrorCode::Unauthorized);

        let api_err: ApiError = AuthError::TokenExpired.into();
        assert_eq!(api_err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
