//! Error types for the Source adapter.

use thiserror::Error;

pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad webhook data: {0}")]
    BadWebhookData(String),

    #[error("no mp4 files: {0}")]
    NoMp4Files(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: usize,
        last_error: Box<SourceError>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("token signing error: {0}")]
    TokenSigning(String),
}

impl SourceError {
    /// §4.2: 4xx other than 429 is terminal; everything else (connection
    /// errors, 5xx, 429) is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http(e) => e.is_timeout() || e.is_connect() || e.status().map(|s| s.is_server_error()).unwrap_or(true),
            SourceError::RateLimited { .. } => true,
            SourceError::Api { status, .. } => *status >= 500 || *status == 429,
            SourceError::Serialization(_) => false,
            SourceError::Config(_) => false,
            SourceError::BadWebhookData(_) => false,
            SourceError::NoMp4Files(_) => true,
            SourceError::RetryExhausted { .. } => false,
            SourceError::NotFound(_) => false,
            SourceError::TokenSigning(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            SourceError::Api { status, .. } => Some(*status),
            SourceError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<SourceError> for crate::domain::PipelineError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::BadWebhookData(m) => crate::domain::PipelineError::BadWebhookData(m),
            SourceError::NoMp4Files(m) => crate::domain::PipelineError::NoMp4Files(m),
            other => crate::domain::PipelineError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable() {
        assert!(SourceError::RateLimited { retry_after_secs: 1 }.is_retryable());
    }

    #[test]
    fn bad_webhook_data_is_terminal() {
        assert!(!SourceError::BadWebhookData("x".into()).is_retryable());
    }

    #[test]
    fn api_4xx_other_than_429_is_terminal() {
        assert!(!SourceError::Api { status: 404, message: "nope".into() }.is_retryable());
    }

    #[test]
    fn api_5xx_is_retryable() {
        assert!(SourceError::Api { status: 503, message: "down".into() }.is_retryable());
    }
}
