use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::api::{
    format_timestamp, ActivateRequest, ActivateResponse, EndpointInfo, HealthResponse,
    ServiceInfo, ValidateRequest, ValidateResponse,
};
use crate::server::api_error::ApiError;
use crate::server::auth::AdminAuthenticator;
use crate::server::database::{ActivationOutcome, Database};
use crate::server::logging::{log_license_event, LicenseEvent};
use crate::server::validation::{require_text, require_user_id, validate_license_key};

/// Shared application state for handlers.
///
/// Built once at startup and cloned into every request; both members are
/// reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<dyn AdminAuthenticator>,
}

impl AppState {
    pub fn new(db: Arc<Database>, auth: Arc<dyn AdminAuthenticator>) -> Self {
        Self { db, auth }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db.backend_name())
            .field("auth", &self.auth.scheme())
            .finish()
    }
}

/// Handler for activating a license.
///
/// `POST /api/activate`
///
/// Behavior:
/// - `key` or `userId` missing (a `userId` of 0 counts as missing) → 400
/// - unknown (or malformed) key → 404 `Invalid key`
/// - key already activated → 400 `Already activated`
/// - otherwise binds the key to `userId` and stamps the activation date
pub async fn activate_handler(
    State(state): State<AppState>,
    payload: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let Json(payload) = payload?;

    let key = require_text(payload.key.as_deref(), "key")
        .map_err(|_| ApiError::missing_fields("Missing key or userId"))?;
    let user_id = require_user_id(payload.user_id, "userId")
        .map_err(|_| ApiError::missing_fields("Missing key or userId"))?;

    info!("Activating key={} for user_id={}", key, user_id);

    if let Err(e) = validate_license_key(key, "key") {
        log_license_event(LicenseEvent::ActivationRejected, key, Some(&e.to_string()));
        return Err(ApiError::invalid_key());
    }

    let now = Utc::now().naive_utc();

    match state.db.activate_license(key, user_id, now).await? {
        ActivationOutcome::Activated(license) => {
            log_license_event(
                LicenseEvent::Activated,
                &license.key,
                Some(&format!("user_id={user_id} script_id={}", license.script_id)),
            );

            let activation_date = license.activation_date.unwrap_or(now);
            Ok(Json(ActivateResponse {
                success: true,
                message: "Activated!".to_string(),
                script_id: license.script_id,
                activation_date: format_timestamp(activation_date),
            }))
        }
        ActivationOutcome::AlreadyActivated(license) => {
            log_license_event(
                LicenseEvent::ActivationRejected,
                &license.key,
                Some("already activated"),
            );
            Err(ApiError::already_activated())
        }
        ActivationOutcome::NotFound => {
            log_license_event(LicenseEvent::ActivationRejected, key, Some("unknown key"));
            Err(ApiError::invalid_key())
        }
    }
}

/// Handler for validating a license.
///
/// `POST /api/validate`
///
/// Returns `valid: true` only if an activated license matches both
/// `userId` and `scriptId`. No match is a normal `200` with `valid: false`.
pub async fn validate_handler(
    State(state): State<AppState>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Json(payload) = payload?;

    let user_id = require_user_id(payload.user_id, "userId")
        .map_err(|_| ApiError::missing_fields("Missing userId or scriptId"))?;
    let script_id = require_text(payload.script_id.as_deref(), "scriptId")
        .map_err(|_| ApiError::missing_fields("Missing userId or scriptId"))?;

    let license = state.db.find_active_license(user_id, script_id).await?;

    match &license {
        Some(found) => log_license_event(
            LicenseEvent::Validated,
            &found.key,
            Some(&format!("user_id={user_id} script_id={script_id}")),
        ),
        None => log_license_event(
            LicenseEvent::ValidationMissed,
            script_id,
            Some(&format!("user_id={user_id}")),
        ),
    }

    Ok(Json(ValidateResponse {
        valid: license.is_some(),
        license: license.map(Into::into),
    }))
}

/// Health check.
///
/// `GET /health`
///
/// Pings the store; answers 500 with `database: "disconnected"` when it
/// cannot be reached.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let timestamp = format_timestamp(Utc::now().naive_utc());

    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                message: "License Server Running".to_string(),
                database: "connected".to_string(),
                timestamp,
            }),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                status: "error".to_string(),
                message: "Database unreachable".to_string(),
                database: "disconnected".to_string(),
                timestamp,
            }),
        ),
    }
}

fn endpoint(method: &str, path: &str, description: &str, auth: Option<&str>) -> EndpointInfo {
    EndpointInfo {
        method: method.to_string(),
        path: path.to_string(),
        description: description.to_string(),
        auth: auth.map(str::to_string),
    }
}

/// Static description of the service and its routes.
///
/// `GET /`
pub async fn info_handler() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "License key server for distributed scripts".to_string(),
        endpoints: vec![
            endpoint("GET", "/health", "Service and database health", None),
            endpoint(
                "POST",
                "/api/create-key",
                "Issue a new license key for a scriptId",
                Some("admin"),
            ),
            endpoint(
                "POST",
                "/api/activate",
                "Bind a license key to a userId (once)",
                None,
            ),
            endpoint(
                "POST",
                "/api/validate",
                "Check whether a userId holds an activated license for a scriptId",
                None,
            ),
        ],
    })
}
