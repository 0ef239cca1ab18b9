use thiserror::Error;

pub type KbResult<T> = Result<T, KbSyncError>;

#[derive(Debug, Error)]
pub enum KbSyncError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Unauthorized request: {0}")]
    Unauthorized(String),

    #[error("Knowledge API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Content source error: {0}")]
    SourceError(String),

    #[error("Field provisioning error: {0}")]
    ProvisioningError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error)
}

impl KbSyncError {
    /// Errors that stop the whole run instead of failing a single record.
    pub fn aborts_run(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::AuthenticationError(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn retry_after(&self) -> Option<u64> {
        if let Self::RateLimited {
            retry_after_seconds
        } = self
        {
            Some(*retry_after_seconds)
        } else {
            None
        }
    }
}
