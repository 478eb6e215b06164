use thiserror::Error;

/// Errors produced by the keysmith library, server and client.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The backing store failed or is unreachable.
    #[error("database error: {0}")]
    DatabaseError(String),

    /// A generated key collided with an existing one on insert.
    #[error("license key already exists: {0}")]
    DuplicateKey(String),

    /// Transport-level failure talking to a license server.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The license server answered with a non-success status.
    #[error("server rejected request ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Any other server-side failure.
    #[error("server error: {0}")]
    ServerError(String),
}

pub type LicenseResult<T> = Result<T, LicenseError>;

impl LicenseError {
    /// Machine-readable code of a `Rejected` error, if the server sent one.
    pub fn rejection_code(&self) -> Option<&str> {
        match self {
            LicenseError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
