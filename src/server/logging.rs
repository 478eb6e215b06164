//! Tracing setup and request logging middleware for keysmith.
//!
//! This module provides:
//! - subscriber initialization driven by [`LoggingConfig`] (with `RUST_LOG` override)
//! - unique request ID tracking, returned in the `X-Request-Id` header
//! - request timing with method, path and status
//! - a single helper for logging license state changes
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware;
//! use keysmith::server::logging::request_logging_middleware;
//!
//! let app = Router::new()
//!     .route("/health", get(health_handler))
//!     .layer(middleware::from_fn(request_logging_middleware));
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_tracing(config: &LoggingConfig) -> LicenseResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.level.to_lowercase())
            .map_err(|e| LicenseError::ConfigError(format!("invalid log level: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| LicenseError::ConfigError(format!("failed to install subscriber: {e}")))
}

/// License state change event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEvent {
    /// A key was issued
    Created,
    /// A key was bound to a user
    Activated,
    /// Activation was refused (unknown key or already activated)
    ActivationRejected,
    /// A validation found an activated license
    Validated,
    /// A validation found nothing
    ValidationMissed,
    /// An admin request failed authentication
    AdminRejected,
}

impl std::fmt::Display for LicenseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LicenseEvent::Created => "created",
            LicenseEvent::Activated => "activated",
            LicenseEvent::ActivationRejected => "activation_rejected",
            LicenseEvent::Validated => "validated",
            LicenseEvent::ValidationMissed => "validation_missed",
            LicenseEvent::AdminRejected => "admin_rejected",
        };
        write!(f, "{}", s)
    }
}

/// Log a license state change event.
///
/// # Arguments
///
/// * `event` - The type of license event
/// * `subject` - The license key, or the route for events without one
/// * `details` - Optional additional details about the event
pub fn log_license_event(event: LicenseEvent, subject: &str, details: Option<&str>) {
    let span = info_span!(
        "license_event",
        event = %event,
        subject = %subject,
    );
    let _enter = span.enter();

    match event {
        LicenseEvent::ActivationRejected | LicenseEvent::AdminRejected => {
            if let Some(d) = details {
                warn!(reason = %d, "License event occurred");
            } else {
                warn!("License event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "License event occurred");
            } else {
                info!("License event occurred");
            }
        }
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
///
/// This middleware:
/// 1. Generates a unique request ID for each incoming request
/// 2. Creates a tracing span with the request ID
/// 3. Logs the request method and path
/// 4. Measures and logs the response time
/// 5. Adds the request ID to the response headers
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    info!(
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_valid_uuid() {
        let id = generate_request_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(generate_request_id(), generate_request_id());
    }

    #[test]
    fn event_names_are_snake_case() {
        assert_eq!(LicenseEvent::ActivationRejected.to_string(), "activation_rejected");
        assert_eq!(LicenseEvent::Created.to_string(), "created");
    }
}
