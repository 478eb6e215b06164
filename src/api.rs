//! JSON request and response bodies shared by the server and [`crate::client`].
//!
//! Field names are camelCase on the wire. Request fields are optional so the
//! server can report a missing field as a validation error instead of a
//! deserialization failure.

use chrono::{NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Format a stored UTC timestamp the way the API exposes it
/// (`2026-01-31T12:00:00.000Z`).
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `POST /api/create-key` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub script_id: Option<String>,
}

/// `POST /api/create-key` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyResponse {
    pub success: bool,
    pub key: String,
    pub script_id: String,
}

/// `POST /api/activate` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub key: Option<String>,
    pub user_id: Option<i64>,
}

/// `POST /api/activate` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    pub success: bool,
    pub message: String,
    pub script_id: String,
    pub activation_date: String,
}

/// `POST /api/validate` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub user_id: Option<i64>,
    pub script_id: Option<String>,
}

/// `POST /api/validate` response body.
///
/// `license` is `null` when no activated record matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub license: Option<LicenseRecord>,
}

/// A license record as exposed over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    pub key: String,
    pub user_id: Option<i64>,
    pub script_id: String,
    pub activated: bool,
    pub activation_date: Option<String>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// `GET /health` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "error"
    pub status: String,
    pub message: String,
    /// "connected" or "disconnected"
    pub database: String,
    pub timestamp: String,
}

/// `GET /` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

/// One route in [`ServiceInfo`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
    pub auth: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn timestamps_use_millis_and_z_suffix() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 4)
            .unwrap()
            .and_hms_milli_opt(5, 6, 7, 89)
            .unwrap();
        assert_eq!(format_timestamp(ts), "2026-03-04T05:06:07.089Z");
    }

    #[test]
    fn requests_use_camel_case_and_tolerate_missing_fields() {
        let req: ActivateRequest = serde_json::from_value(json!({ "key": "K" })).unwrap();
        assert_eq!(req.key.as_deref(), Some("K"));
        assert!(req.user_id.is_none());

        let req: ValidateRequest =
            serde_json::from_value(json!({ "userId": 7, "scriptId": "s" })).unwrap();
        assert_eq!(req.user_id, Some(7));
        assert_eq!(req.script_id.as_deref(), Some("s"));
    }

    #[test]
    fn negative_validation_serializes_null_license() {
        let body = serde_json::to_value(ValidateResponse {
            valid: false,
            license: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "valid": false, "license": null }));
    }
}
