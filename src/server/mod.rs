// src/server/mod.rs

//! Server-side components for keysmith.
//!
//! This module contains:
//! - `database`    → license store over SQLite/Postgres
//! - `handlers`    → Axum handlers for activate/validate/health/info
//! - `admin`       → key issuing (admin credential required)
//! - `auth`        → pluggable admin authentication (API key, or JWT with `jwt-auth`)
//! - `api_error`   → error body and status mapping
//! - `cors`        → permissive CORS middleware
//! - `logging`     → tracing setup and request logging middleware
//! - `routes`      → Router builder
//! - `validation`  → Request validation utilities

pub mod admin;
pub mod api_error;
pub mod auth;
pub mod cors;
pub mod database;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod validation;

pub use admin::create_key_handler;
pub use api_error::{ApiError, ErrorCode};
pub use auth::{
    authenticator_from_config, AdminAccess, AdminAuthenticator, AdminIdentity,
    ApiKeyAuthenticator, AuthError, API_KEY_HEADER,
};
pub use database::{ActivationOutcome, Database, License};
pub use handlers::{activate_handler, health_handler, info_handler, validate_handler, AppState};
pub use logging::{init_tracing, log_license_event, LicenseEvent, REQUEST_ID_HEADER};
pub use routes::build_router;
pub use validation::{
    require_text, require_user_id, validate_license_key, ValidationError, ValidationResult,
};

#[cfg(feature = "jwt-auth")]
pub use auth::jwt::{Claims, JwtAuthenticator};
