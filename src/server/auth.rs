//! Admin authentication for key-issuing endpoints.
//!
//! Handlers never look at credentials directly. They take an [`AdminAccess`]
//! extractor, which asks the [`AdminAuthenticator`] held in [`AppState`]
//! to accept or reject the request headers. Swapping the credential scheme
//! means swapping the authenticator, not touching handlers.
//!
//! Two schemes ship with the crate:
//! - [`ApiKeyAuthenticator`] - shared secret in the `x-api-key` header (default)
//! - [`JwtAuthenticator`] - HS256 bearer tokens with a `licenses:write` scope
//!   (requires the `jwt-auth` feature)

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{resolve_secret, AuthConfig};
use crate::errors::{LicenseError, LicenseResult};
use crate::server::api_error::ApiError;
use crate::server::handlers::AppState;
use crate::server::logging::{log_license_event, LicenseEvent};

#[cfg(feature = "jwt-auth")]
pub use jwt::{Claims, JwtAuthenticator};

/// Header carrying the shared admin secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Scope a bearer token needs to issue keys.
pub const ISSUE_SCOPE: &str = "licenses:write";

/// Who was let through by an authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub subject: String,
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential in the request
    #[error("missing admin credential")]
    MissingCredential,
    /// Credential present but wrong
    #[error("invalid admin credential")]
    InvalidCredential,
    /// Header present but not parseable
    #[error("malformed credential header")]
    InvalidHeader,
    /// Bearer token failed verification
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Bearer token has expired
    #[error("token has expired")]
    TokenExpired,
    /// Token is valid but lacks the needed scope
    #[error("insufficient scope: requires {0}")]
    InsufficientScope(String),
}

/// A pluggable admin credential check.
pub trait AdminAuthenticator: Send + Sync + std::fmt::Debug {
    /// Accept or reject a request based on its headers.
    fn authenticate(&self, headers: &HeaderMap) -> Result<AdminIdentity, AuthError>;

    /// Short scheme name for logs.
    fn scheme(&self) -> &'static str;
}

/// Shared-secret check against the `x-api-key` header.
///
/// Only the SHA-256 digest of the secret is kept, and the presented value is
/// hashed before comparison so the comparison length never depends on input.
pub struct ApiKeyAuthenticator {
    digest: Vec<u8>,
}

impl ApiKeyAuthenticator {
    /// Build from the configured secret. An empty secret is refused, so an
    /// unset secret can never match an absent header.
    pub fn new(secret: &str) -> LicenseResult<Self> {
        if secret.is_empty() {
            return Err(LicenseError::ConfigError(
                "admin api key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            digest: Sha256::digest(secret.as_bytes()).to_vec(),
        })
    }
}

impl std::fmt::Debug for ApiKeyAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuthenticator").finish_non_exhaustive()
    }
}

impl AdminAuthenticator for ApiKeyAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AdminIdentity, AuthError> {
        let presented = headers
            .get(API_KEY_HEADER)
            .ok_or(AuthError::MissingCredential)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeader)?;

        let digest = Sha256::digest(presented.as_bytes());
        if digest.as_slice() == self.digest.as_slice() {
            Ok(AdminIdentity {
                subject: "admin-api-key".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredential)
        }
    }

    fn scheme(&self) -> &'static str {
        "api-key"
    }
}

/// Build the authenticator selected by `auth.mode`.
pub fn authenticator_from_config(config: &AuthConfig) -> LicenseResult<Arc<dyn AdminAuthenticator>> {
    match config.mode.as_str() {
        "api-key" => {
            let secret = resolve_secret(&config.admin_api_key)?;
            Ok(Arc::new(ApiKeyAuthenticator::new(&secret)?))
        }
        #[cfg(feature = "jwt-auth")]
        "jwt" => Ok(Arc::new(JwtAuthenticator::from_config(config)?)),
        #[cfg(not(feature = "jwt-auth"))]
        "jwt" => Err(LicenseError::ConfigError(
            "JWT support not compiled in. Enable the 'jwt-auth' feature.".to_string(),
        )),
        other => Err(LicenseError::ConfigError(format!(
            "unsupported auth mode: {other}"
        ))),
    }
}

/// Extractor that admits only requests the configured authenticator accepts.
///
/// ```rust,ignore
/// async fn admin_only(AdminAccess(admin): AdminAccess) -> String {
///     admin.subject
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AdminAccess(pub AdminIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.auth.authenticate(&parts.headers) {
            Ok(identity) => Ok(AdminAccess(identity)),
            Err(err) => {
                log_license_event(
                    LicenseEvent::AdminRejected,
                    parts.uri.path(),
                    Some(&format!("{} ({})", err, state.auth.scheme())),
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(feature = "jwt-auth")]
pub mod jwt {
    use axum::http::HeaderMap;
    use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
    use serde::{Deserialize, Serialize};

    use super::{AdminAuthenticator, AdminIdentity, AuthError, ISSUE_SCOPE};
    use crate::config::{resolve_secret, AuthConfig};
    use crate::errors::{LicenseError, LicenseResult};

    /// JWT claims structure.
    #[derive(Debug, Serialize, Deserialize, Clone)]
    pub struct Claims {
        /// Subject (operator or service name)
        pub sub: String,
        /// Issued at (Unix timestamp)
        pub iat: u64,
        /// Expiration time (Unix timestamp)
        pub exp: u64,
        /// Issuer
        pub iss: String,
        /// Audience
        pub aud: String,
        /// Scopes (space-separated list)
        #[serde(default)]
        pub scope: String,
    }

    impl Claims {
        /// Check if the claims include a specific scope.
        ///
        /// `*` grants everything; `licenses:*` grants every `licenses:` scope.
        pub fn has_scope(&self, required: &str) -> bool {
            self.scope.split_whitespace().any(|scope| {
                if scope == "*" || scope == required {
                    return true;
                }
                match scope.strip_suffix(":*") {
                    Some(prefix) => required
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with(':')),
                    None => false,
                }
            })
        }
    }

    /// HS256 bearer-token check.
    #[derive(Clone)]
    pub struct JwtAuthenticator {
        decoding_key: DecodingKey,
        encoding_key: EncodingKey,
        validation: Validation,
        issuer: String,
        audience: String,
    }

    impl JwtAuthenticator {
        /// Create a new authenticator from auth configuration.
        pub fn from_config(config: &AuthConfig) -> LicenseResult<Self> {
            let secret = resolve_secret(&config.jwt_secret)?;
            if secret.is_empty() {
                return Err(LicenseError::ConfigError(
                    "jwt_secret is required for JWT authentication".to_string(),
                ));
            }

            let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
            validation.set_issuer(&[&config.jwt_issuer]);
            validation.set_audience(&[&config.jwt_audience]);
            validation.validate_exp = true;

            Ok(Self {
                decoding_key: DecodingKey::from_secret(secret.as_bytes()),
                encoding_key: EncodingKey::from_secret(secret.as_bytes()),
                validation,
                issuer: config.jwt_issuer.clone(),
                audience: config.jwt_audience.clone(),
            })
        }

        /// Validate a token and extract its claims.
        pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
            decode::<Claims>(token, &self.decoding_key, &self.validation)
                .map(|data| data.claims)
                .map_err(|e| match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(e.to_string()),
                })
        }

        /// Mint a token for `subject` valid for `ttl_secs`.
        pub fn create_token(
            &self,
            subject: &str,
            scopes: &[&str],
            ttl_secs: u64,
        ) -> LicenseResult<String> {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|e| LicenseError::ServerError(format!("system time error: {e}")))?
                .as_secs();

            let claims = Claims {
                sub: subject.to_string(),
                iat: now,
                exp: now + ttl_secs,
                iss: self.issuer.clone(),
                aud: self.audience.clone(),
                scope: scopes.join(" "),
            };

            encode(&Header::default(), &claims, &self.encoding_key)
                .map_err(|e| LicenseError::ServerError(format!("failed to create token: {e}")))
        }
    }

    impl std::fmt::Debug for JwtAuthenticator {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("JwtAuthenticator")
                .field("issuer", &self.issuer)
                .field("audience", &self.audience)
                .finish()
        }
    }

    impl AdminAuthenticator for JwtAuthenticator {
        fn authenticate(&self, headers: &HeaderMap) -> Result<AdminIdentity, AuthError> {
            let header = headers
                .get("Authorization")
                .ok_or(AuthError::MissingCredential)?
                .to_str()
                .map_err(|_| AuthError::InvalidHeader)?;

            let token = header
                .strip_prefix("Bearer ")
                .ok_or(AuthError::InvalidHeader)?;

            let claims = self.validate_token(token)?;
            if !claims.has_scope(ISSUE_SCOPE) {
                return Err(AuthError::InsufficientScope(ISSUE_SCOPE.to_string()));
            }

            Ok(AdminIdentity { subject: claims.sub })
        }

        fn scheme(&self) -> &'static str {
            "jwt"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use axum::http::HeaderValue;

        fn test_config() -> AuthConfig {
            AuthConfig {
                mode: "jwt".to_string(),
                jwt_secret: "test-secret-key-for-testing-only".to_string(),
                ..AuthConfig::default()
            }
        }

        fn bearer(token: &str) -> HeaderMap {
            let mut headers = HeaderMap::new();
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
            );
            headers
        }

        #[test]
        fn accepts_token_with_write_scope() {
            let auth = JwtAuthenticator::from_config(&test_config()).unwrap();
            let token = auth.create_token("ops", &["licenses:write"], 3600).unwrap();

            let identity = auth.authenticate(&bearer(&token)).unwrap();
            assert_eq!(identity.subject, "ops");
        }

        #[test]
        fn rejects_token_without_write_scope() {
            let auth = JwtAuthenticator::from_config(&test_config()).unwrap();
            let token = auth.create_token("reader", &["licenses:read"], 3600).unwrap();

            assert_eq!(
                auth.authenticate(&bearer(&token)),
                Err(AuthError::InsufficientScope(ISSUE_SCOPE.to_string()))
            );
        }

        #[test]
        fn rejects_token_signed_with_other_secret() {
            let auth = JwtAuthenticator::from_config(&test_config()).unwrap();
            let other = JwtAuthenticator::from_config(&AuthConfig {
                jwt_secret: "different-secret".to_string(),
                ..test_config()
            })
            .unwrap();
            let token = other.create_token("ops", &["*"], 3600).unwrap();

            assert!(matches!(
                auth.authenticate(&bearer(&token)),
                Err(AuthError::InvalidToken(_))
            ));
        }

        #[test]
        fn rejects_missing_or_malformed_header() {
            let auth = JwtAuthenticator::from_config(&test_config()).unwrap();
            assert_eq!(
                auth.authenticate(&HeaderMap::new()),
                Err(AuthError::MissingCredential)
            );

            let mut headers = HeaderMap::new();
            headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
            assert_eq!(auth.authenticate(&headers), Err(AuthError::InvalidHeader));
        }

        #[test]
        fn scope_matching() {
            let claims = Claims {
                sub: "test".to_string(),
                iat: 0,
                exp: u64::MAX,
                iss: "keysmith".to_string(),
                aud: "keysmith-admin".to_string(),
                scope: "licenses:* tokens:read".to_string(),
            };
            assert!(claims.has_scope("licenses:write"));
            assert!(claims.has_scope("tokens:read"));
            assert!(!claims.has_scope("tokens:write"));
            assert!(!claims.has_scope("licensesx:write"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_key(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn api_key_accepts_exact_secret() {
        let auth = ApiKeyAuthenticator::new("s3cret").unwrap();
        assert!(auth.authenticate(&with_key("s3cret")).is_ok());
    }

    #[test]
    fn api_key_rejects_wrong_or_missing_secret() {
        let auth = ApiKeyAuthenticator::new("s3cret").unwrap();
        assert_eq!(
            auth.authenticate(&with_key("s3cret ")),
            Err(AuthError::InvalidCredential)
        );
        assert_eq!(
            auth.authenticate(&with_key("S3CRET")),
            Err(AuthError::InvalidCredential)
        );
        assert_eq!(
            auth.authenticate(&HeaderMap::new()),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(ApiKeyAuthenticator::new("").is_err());
    }

    #[test]
    fn debug_output_hides_digest() {
        let auth = ApiKeyAuthenticator::new("s3cret").unwrap();
        assert_eq!(format!("{auth:?}"), "ApiKeyAuthenticator { .. }");
    }

    #[test]
    fn config_selects_scheme() {
        let config = AuthConfig {
            admin_api_key: "s3cret".to_string(),
            ..AuthConfig::default()
        };
        let auth = authenticator_from_config(&config).unwrap();
        assert_eq!(auth.scheme(), "api-key");

        let config = AuthConfig {
            mode: "ldap".to_string(),
            ..AuthConfig::default()
        };
        assert!(authenticator_from_config(&config).is_err());
    }
}
