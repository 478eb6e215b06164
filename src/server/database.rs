use chrono::NaiveDateTime;
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
#[cfg(feature = "sqlite")]
use std::str::FromStr;

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::api::{format_timestamp, LicenseRecord};
use crate::config::DatabaseConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Represents a license record stored in the database.
///
/// This mirrors the `licenses` table created by [`Database::migrate`].
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct License {
    pub key: String,
    pub user_id: Option<i64>,
    pub script_id: String,
    pub activated: bool,
    pub activation_date: Option<NaiveDateTime>,
}

impl License {
    /// A freshly issued, not yet activated license.
    pub fn issued(key: impl Into<String>, script_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            user_id: None,
            script_id: script_id.into(),
            activated: false,
            activation_date: None,
        }
    }
}

impl From<License> for LicenseRecord {
    fn from(license: License) -> Self {
        Self {
            key: license.key,
            user_id: license.user_id,
            script_id: license.script_id,
            activated: license.activated,
            activation_date: license.activation_date.map(format_timestamp),
        }
    }
}

/// Result of a conditional activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// This call performed the activation.
    Activated(License),
    /// The key exists but was activated earlier.
    AlreadyActivated(License),
    /// No license with that key.
    NotFound,
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

fn db_error(op: &str, backend: &str, e: sqlx::Error) -> LicenseError {
    error!("{backend} {op} failed: {e}");
    LicenseError::DatabaseError(e.to_string())
}

fn insert_error(backend: &str, key: &str, e: sqlx::Error) -> LicenseError {
    let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
    if duplicate {
        error!("{backend} insert_license collided on key={key}");
        LicenseError::DuplicateKey(key.to_string())
    } else {
        db_error("insert_license", backend, e)
    }
}

impl Database {
    /// Open a connection pool for the configured URL.
    ///
    /// The URL scheme picks the backend. An in-memory SQLite URL is capped
    /// at one connection, since every new connection would open a separate
    /// empty database.
    pub async fn connect(config: &DatabaseConfig) -> LicenseResult<Arc<Self>> {
        match config.backend() {
            #[cfg(feature = "sqlite")]
            Some("sqlite") => {
                let options = SqliteConnectOptions::from_str(&config.url)
                    .map_err(|e| LicenseError::ConfigError(format!("invalid SQLite URL: {e}")))?
                    .create_if_missing(true);

                // An in-memory database lives only as long as its one connection.
                let pool_options = if config.url.contains(":memory:") {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                } else {
                    SqlitePoolOptions::new().max_connections(config.max_connections)
                };

                let pool = pool_options
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        LicenseError::DatabaseError(format!("failed to connect to SQLite: {e}"))
                    })?;

                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            Some("sqlite") => Err(LicenseError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            Some("postgres") => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        LicenseError::DatabaseError(format!(
                            "failed to connect to PostgreSQL: {e}"
                        ))
                    })?;

                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            Some("postgres") => Err(LicenseError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            _ => Err(LicenseError::ConfigError(format!(
                "unsupported database url: {}",
                config.url
            ))),
        }
    }

    /// Short backend name, used by health output and logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Create the `licenses` table and its lookup index if they are missing.
    pub async fn migrate(&self) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS licenses (
                        key             TEXT PRIMARY KEY,
                        user_id         INTEGER,
                        script_id       TEXT NOT NULL,
                        activated       BOOLEAN NOT NULL DEFAULT FALSE,
                        activation_date TEXT
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| db_error("migrate", "SQLite", e))?;

                query(
                    "CREATE INDEX IF NOT EXISTS idx_licenses_user_script \
                     ON licenses (user_id, script_id)",
                )
                .execute(pool)
                .await
                .map_err(|e| db_error("migrate", "SQLite", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS licenses (
                        key             TEXT PRIMARY KEY,
                        user_id         BIGINT,
                        script_id       TEXT NOT NULL,
                        activated       BOOLEAN NOT NULL DEFAULT FALSE,
                        activation_date TIMESTAMP
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| db_error("migrate", "Postgres", e))?;

                query(
                    "CREATE INDEX IF NOT EXISTS idx_licenses_user_script \
                     ON licenses (user_id, script_id)",
                )
                .execute(pool)
                .await
                .map_err(|e| db_error("migrate", "Postgres", e))?;
            }
        }

        info!("licenses schema ready on {}", self.backend_name());
        Ok(())
    }

    /// Insert a newly issued license.
    ///
    /// This is a plain insert: a key that already exists fails with
    /// `LicenseError::DuplicateKey` and nothing is overwritten.
    pub async fn insert_license(&self, license: &License) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "INSERT INTO licenses (key, user_id, script_id, activated, activation_date) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&license.key)
                .bind(license.user_id)
                .bind(&license.script_id)
                .bind(license.activated)
                .bind(license.activation_date)
                .execute(pool)
                .await
                .map_err(|e| insert_error("SQLite", &license.key, e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO licenses (key, user_id, script_id, activated, activation_date) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(&license.key)
                .bind(license.user_id)
                .bind(&license.script_id)
                .bind(license.activated)
                .bind(license.activation_date)
                .execute(pool)
                .await
                .map_err(|e| insert_error("Postgres", &license.key, e))?;
            }
        }

        Ok(())
    }

    /// Fetch a license by its key.
    ///
    /// Returns:
    /// - `Ok(Some(License))` if found
    /// - `Ok(None)` if not found
    /// - `Err(LicenseError::DatabaseError)` on DB failure
    pub async fn get_license(&self, key: &str) -> LicenseResult<Option<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>("SELECT * FROM licenses WHERE key = ?")
                .bind(key)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_error("get_license", "SQLite", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, License>("SELECT * FROM licenses WHERE key = $1")
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_error("get_license", "Postgres", e))
            }
        }
    }

    /// Bind a license to a user, exactly once.
    ///
    /// The check and the write are one conditional `UPDATE ... WHERE
    /// activated = FALSE ... RETURNING *`, so concurrent callers racing on the
    /// same key see exactly one `Activated`, and a successful activation is a
    /// single store call. Only when no row changes does a follow-up read tell
    /// an unknown key apart from one that is already activated; activation
    /// never reverts, so that read cannot contradict the update.
    pub async fn activate_license(
        &self,
        key: &str,
        user_id: i64,
        activated_at: NaiveDateTime,
    ) -> LicenseResult<ActivationOutcome> {
        let updated = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>(
                "UPDATE licenses \
                     SET user_id = ?, activated = TRUE, activation_date = ? \
                     WHERE key = ? AND activated = FALSE \
                     RETURNING *",
            )
            .bind(user_id)
            .bind(activated_at)
            .bind(key)
            .fetch_all(pool)
            .await
            .map_err(|e| db_error("activate_license", "SQLite", e))?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, License>(
                "UPDATE licenses \
                     SET user_id = $1, activated = TRUE, activation_date = $2 \
                     WHERE key = $3 AND activated = FALSE \
                     RETURNING *",
            )
            .bind(user_id)
            .bind(activated_at)
            .bind(key)
            .fetch_all(pool)
            .await
            .map_err(|e| db_error("activate_license", "Postgres", e))?,
        };

        // `key` is the primary key, so at most one row comes back.
        if let Some(license) = updated.into_iter().next() {
            return Ok(ActivationOutcome::Activated(license));
        }

        Ok(match self.get_license(key).await? {
            Some(license) => ActivationOutcome::AlreadyActivated(license),
            None => ActivationOutcome::NotFound,
        })
    }

    /// Find an activated license held by `user_id` for `script_id`.
    pub async fn find_active_license(
        &self,
        user_id: i64,
        script_id: &str,
    ) -> LicenseResult<Option<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>(
                "SELECT * FROM licenses \
                     WHERE user_id = ? AND script_id = ? AND activated = TRUE \
                     ORDER BY activation_date \
                     LIMIT 1",
            )
            .bind(user_id)
            .bind(script_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_error("find_active_license", "SQLite", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, License>(
                "SELECT * FROM licenses \
                     WHERE user_id = $1 AND script_id = $2 AND activated = TRUE \
                     ORDER BY activation_date \
                     LIMIT 1",
            )
            .bind(user_id)
            .bind(script_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_error("find_active_license", "Postgres", e)),
        }
    }

    /// Round-trip a trivial query to confirm the store is reachable.
    pub async fn ping(&self) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("ping", "SQLite", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(|e| db_error("ping", "Postgres", e))?;
            }
        }

        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => pool.close().await,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => pool.close().await,
        }
    }
}
