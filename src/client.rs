//! HTTP client for a keysmith license server.
//!
//! ```rust,ignore
//! use keysmith::client::LicenseClient;
//!
//! let client = LicenseClient::new("http://localhost:3000")?.with_admin_key("secret");
//! let issued = client.create_key("my-script").await?;
//! client.activate(&issued.key, 42).await?;
//! assert!(client.validate(42, "my-script").await?.valid);
//! ```
//!
//! Any non-2xx answer becomes [`LicenseError::Rejected`], carrying the
//! server's `error` message and machine-readable `code` when present.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    ActivateRequest, ActivateResponse, CreateKeyRequest, CreateKeyResponse, ErrorResponse,
    HealthResponse, ValidateRequest, ValidateResponse,
};
use crate::errors::{LicenseError, LicenseResult};

/// Header carrying the admin API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Client for the license server's HTTP API.
#[derive(Clone)]
pub struct LicenseClient {
    http: Client,
    base_url: String,
    admin_key: Option<String>,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for LicenseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseClient")
            .field("base_url", &self.base_url)
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl LicenseClient {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:3000`).
    pub fn new(base_url: impl Into<String>) -> LicenseResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LicenseError::ConfigError(format!(
                "server url must start with http:// or https://: {base_url}"
            )));
        }

        Ok(Self {
            http: Client::new(),
            base_url,
            admin_key: None,
            bearer_token: None,
        })
    }

    /// Send `x-api-key` on admin requests.
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = Some(key.into());
        self
    }

    /// Send `Authorization: Bearer <token>` on admin requests.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_admin_credentials(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.admin_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Issue a new key for `script_id`. Needs an admin credential.
    pub async fn create_key(&self, script_id: &str) -> LicenseResult<CreateKeyResponse> {
        let body = CreateKeyRequest {
            script_id: Some(script_id.to_string()),
        };
        let request = self
            .with_admin_credentials(self.http.post(self.url("/api/create-key")))
            .json(&body);

        decode(request.send().await?).await
    }

    /// Bind `key` to `user_id`.
    pub async fn activate(&self, key: &str, user_id: i64) -> LicenseResult<ActivateResponse> {
        let body = ActivateRequest {
            key: Some(key.to_string()),
            user_id: Some(user_id),
        };
        let resp = self
            .http
            .post(self.url("/api/activate"))
            .json(&body)
            .send()
            .await?;

        decode(resp).await
    }

    /// Ask whether `user_id` holds an activated license for `script_id`.
    ///
    /// A negative answer is `Ok` with `valid: false`, not an error.
    pub async fn validate(&self, user_id: i64, script_id: &str) -> LicenseResult<ValidateResponse> {
        let body = ValidateRequest {
            user_id: Some(user_id),
            script_id: Some(script_id.to_string()),
        };
        let resp = self
            .http
            .post(self.url("/api/validate"))
            .json(&body)
            .send()
            .await?;

        decode(resp).await
    }

    /// Fetch `/health`. An unhealthy server comes back as `Rejected` with status 500.
    pub async fn health(&self) -> LicenseResult<HealthResponse> {
        let resp = self.http.get(self.url("/health")).send().await?;
        decode(resp).await
    }
}

/// Decode a success body, or turn the error body into `Rejected`.
async fn decode<T: DeserializeOwned>(resp: Response) -> LicenseResult<T> {
    let status = resp.status();
    debug!(status = status.as_u16(), url = %resp.url(), "license server response");

    if status.is_success() {
        return resp.json::<T>().await.map_err(|e| {
            LicenseError::ServerError(format!("failed to parse server response: {e}"))
        });
    }

    let text = resp.text().await.unwrap_or_default();
    Err(rejection(status.as_u16(), &text))
}

fn rejection(status: u16, body: &str) -> LicenseError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => LicenseError::Rejected {
            status,
            code: err.code,
            message: err.error,
        },
        Err(_) => LicenseError::Rejected {
            status,
            code: None,
            message: if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.to_string()
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash() {
        let client = LicenseClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[test]
    fn new_rejects_non_http_urls() {
        assert!(matches!(
            LicenseClient::new("localhost:3000"),
            Err(LicenseError::ConfigError(_))
        ));
    }

    #[test]
    fn debug_redacts_credentials() {
        let client = LicenseClient::new("http://x")
            .unwrap()
            .with_admin_key("super-secret");
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn rejection_reads_error_body() {
        let err = rejection(
            404,
            r#"{"success":false,"error":"Invalid key","code":"LICENSE_NOT_FOUND"}"#,
        );
        match &err {
            LicenseError::Rejected {
                status, message, ..
            } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "Invalid key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.rejection_code(), Some("LICENSE_NOT_FOUND"));
    }

    #[test]
    fn rejection_tolerates_non_json_body() {
        let err = rejection(502, "");
        match err {
            LicenseError::Rejected { status, code, message } => {
                assert_eq!(status, 502);
                assert!(code.is_none());
                assert_eq!(message, "HTTP 502");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
