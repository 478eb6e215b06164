//! Admin handlers for issuing license keys.
//!
//! # Endpoints
//!
//! - `POST /api/create-key` - Issue a new unactivated key for a script
//!
//! Every admin handler takes [`AdminAccess`] as its first extractor, so a
//! missing or wrong credential is rejected before the body is even parsed.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

use crate::api::{CreateKeyRequest, CreateKeyResponse};
use crate::errors::LicenseResult;
use crate::license_key::generate_license_key;
use crate::server::api_error::ApiError;
use crate::server::auth::AdminAccess;
use crate::server::database::{Database, License};
use crate::server::handlers::AppState;
use crate::server::logging::{log_license_event, LicenseEvent};
use crate::server::validation::require_text;

/// Generate a key and store it as a fresh, unactivated license.
///
/// A collision with an existing key surfaces as `DuplicateKey`; the primary
/// key constraint is the only uniqueness check.
async fn issue_license(db: &Database, script_id: &str) -> LicenseResult<License> {
    let license = License::issued(generate_license_key(), script_id);
    db.insert_license(&license).await?;
    Ok(license)
}

/// Issue a new license key.
///
/// `POST /api/create-key`
///
/// Requires the admin credential. Responds `200` with the key and the
/// `scriptId` it was issued for; the key starts unactivated. A key collision
/// is a 500 and is not retried.
pub async fn create_key_handler(
    State(state): State<AppState>,
    AdminAccess(admin): AdminAccess,
    payload: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> Result<Json<CreateKeyResponse>, ApiError> {
    let Json(payload) = payload?;

    let script_id = require_text(payload.script_id.as_deref(), "scriptId")
        .map_err(|_| ApiError::missing_fields("Missing scriptId"))?;

    info!(
        "Creating license key for script_id={} (by {})",
        script_id, admin.subject
    );

    let license = issue_license(&state.db, script_id).await?;

    log_license_event(
        LicenseEvent::Created,
        &license.key,
        Some(&format!("script_id={}", license.script_id)),
    );

    Ok(Json(CreateKeyResponse {
        success: true,
        key: license.key,
        script_id: license.script_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::license_key::is_valid_key_format;

    async fn memory_db() -> std::sync::Arc<Database> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        let db = Database::connect(&config).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn issued_license_is_stored_unactivated() {
        let db = memory_db().await;
        let license = issue_license(&db, "script-1").await.unwrap();

        assert!(is_valid_key_format(&license.key));

        let stored = db.get_license(&license.key).await.unwrap().unwrap();
        assert_eq!(stored.script_id, "script-1");
        assert!(!stored.activated);
        assert!(stored.user_id.is_none());
        assert!(stored.activation_date.is_none());
    }

    #[tokio::test]
    async fn repeated_issues_give_distinct_keys() {
        let db = memory_db().await;
        let a = issue_license(&db, "s").await.unwrap();
        let b = issue_license(&db, "s").await.unwrap();
        assert_ne!(a.key, b.key);
    }
}
