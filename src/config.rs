//! Configuration system for keysmith.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file (or an explicit file passed to [`KeysmithConfig::load_from`])
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `PORT` / `KEYSMITH_SERVER_PORT` - Server port
//! - `KEYSMITH_SERVER_HOST` - Server bind address
//! - `DATABASE_URL` / `KEYSMITH_DATABASE_URL` - Store connection URL
//! - `KEYSMITH_DATABASE_MAX_CONNECTIONS` - Pool size
//! - `KEYSMITH_AUTH_MODE` - Admin credential scheme (`api-key` or `jwt`)
//! - `ADMIN_API_KEY` / `KEYSMITH_ADMIN_API_KEY` - Shared admin secret
//! - `KEYSMITH_JWT_SECRET`, `KEYSMITH_JWT_ISSUER`, `KEYSMITH_JWT_AUDIENCE` - JWT settings
//! - `KEYSMITH_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//!
//! The prefixed variables win over the unprefixed ones when both are set.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder};
use serde::Deserialize;
use std::env;

use crate::errors::{LicenseError, LicenseResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeysmithConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Store configuration
    pub database: DatabaseConfig,
    /// Admin authentication configuration
    pub auth: AuthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; the scheme selects the backend
    pub url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://keysmith.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Backend name derived from the URL scheme.
    pub fn backend(&self) -> Option<&'static str> {
        if self.url.starts_with("sqlite:") {
            Some("sqlite")
        } else if self.url.starts_with("postgres://") || self.url.starts_with("postgresql://") {
            Some("postgres")
        } else {
            None
        }
    }
}

/// Admin authentication configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Credential scheme: "api-key" or "jwt"
    pub mode: String,
    /// Shared secret expected in the `x-api-key` header (use `env:VAR_NAME` to indirect)
    pub admin_api_key: String,
    /// JWT secret key (use `env:VAR_NAME` to indirect)
    pub jwt_secret: String,
    /// JWT issuer claim (iss)
    pub jwt_issuer: String,
    /// JWT audience claim (aud)
    pub jwt_audience: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: "api-key".to_string(),
            admin_api_key: String::new(),
            jwt_secret: String::new(),
            jwt_issuer: "keysmith".to_string(),
            jwt_audience: "keysmith-admin".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

/// First set, non-empty environment variable among `names`.
fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.is_empty())
}

fn env_number(names: &[&str]) -> Option<i64> {
    first_env(names).and_then(|v| v.parse::<i64>().ok())
}

impl KeysmithConfig {
    /// Load configuration from `config.toml` (if present) and the environment.
    pub fn load() -> LicenseResult<Self> {
        Self::build(config::File::with_name("config").required(false))
    }

    /// Load configuration from an explicit file and the environment.
    pub fn load_from(path: &str) -> LicenseResult<Self> {
        Self::build(config::File::with_name(path).required(true))
    }

    fn defaults() -> LicenseResult<ConfigBuilder<DefaultState>> {
        let defaults = KeysmithConfig::default();

        Config::builder()
            .set_default("server.host", defaults.server.host)
            .map_err(config_err)?
            .set_default("server.port", i64::from(defaults.server.port))
            .map_err(config_err)?
            .set_default("database.url", defaults.database.url)
            .map_err(config_err)?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )
            .map_err(config_err)?
            .set_default("auth.mode", defaults.auth.mode)
            .map_err(config_err)?
            .set_default("auth.admin_api_key", defaults.auth.admin_api_key)
            .map_err(config_err)?
            .set_default("auth.jwt_secret", defaults.auth.jwt_secret)
            .map_err(config_err)?
            .set_default("auth.jwt_issuer", defaults.auth.jwt_issuer)
            .map_err(config_err)?
            .set_default("auth.jwt_audience", defaults.auth.jwt_audience)
            .map_err(config_err)?
            .set_default("logging.level", defaults.logging.level)
            .map_err(config_err)
    }

    fn build<S>(file: S) -> LicenseResult<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let builder = Self::defaults()?
            .add_source(file)
            // Override with environment variables
            .set_override_option("server.host", first_env(&["KEYSMITH_SERVER_HOST"]))
            .map_err(config_err)?
            .set_override_option("server.port", env_number(&["KEYSMITH_SERVER_PORT", "PORT"]))
            .map_err(config_err)?
            .set_override_option(
                "database.url",
                first_env(&["KEYSMITH_DATABASE_URL", "DATABASE_URL"]),
            )
            .map_err(config_err)?
            .set_override_option(
                "database.max_connections",
                env_number(&["KEYSMITH_DATABASE_MAX_CONNECTIONS"]),
            )
            .map_err(config_err)?
            .set_override_option("auth.mode", first_env(&["KEYSMITH_AUTH_MODE"]))
            .map_err(config_err)?
            .set_override_option(
                "auth.admin_api_key",
                first_env(&["KEYSMITH_ADMIN_API_KEY", "ADMIN_API_KEY"]),
            )
            .map_err(config_err)?
            .set_override_option("auth.jwt_secret", first_env(&["KEYSMITH_JWT_SECRET"]))
            .map_err(config_err)?
            .set_override_option("auth.jwt_issuer", first_env(&["KEYSMITH_JWT_ISSUER"]))
            .map_err(config_err)?
            .set_override_option("auth.jwt_audience", first_env(&["KEYSMITH_JWT_AUDIENCE"]))
            .map_err(config_err)?
            .set_override_option("logging.level", first_env(&["KEYSMITH_LOG_LEVEL"]))
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.server.port == 0 {
            return Err(LicenseError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        if self.database.backend().is_none() {
            return Err(LicenseError::ConfigError(format!(
                "database.url must start with 'sqlite:' or 'postgres://', got '{}'",
                self.database.url
            )));
        }

        if self.database.max_connections == 0 {
            return Err(LicenseError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        match self.auth.mode.as_str() {
            "api-key" => {
                if self.auth.admin_api_key.is_empty() {
                    return Err(LicenseError::ConfigError(
                        "auth.admin_api_key is required when auth.mode is 'api-key' (set ADMIN_API_KEY)"
                            .to_string(),
                    ));
                }
            }
            "jwt" => {
                if self.auth.jwt_secret.is_empty() {
                    return Err(LicenseError::ConfigError(
                        "auth.jwt_secret is required when auth.mode is 'jwt'".to_string(),
                    ));
                }
            }
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "auth.mode must be 'api-key' or 'jwt', got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Resolve a secret value, following an `env:VAR_NAME` indirection.
pub fn resolve_secret(value: &str) -> LicenseResult<String> {
    match value.strip_prefix("env:") {
        Some(var) => env::var(var).map_err(|_| {
            LicenseError::ConfigError(format!("environment variable '{var}' not found"))
        }),
        None => Ok(value.to_string()),
    }
}
