//! Error types for the Sink adapter.

use thiserror::Error;

pub type SinkResult<T> = std::result::Result<T, SinkError>;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("mediapackage invalid: {0}")]
    MediapackageInvalid(String),

    #[error("file missing: {0}")]
    FileMissing(String),

    #[error("size mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: u64, found: u64 },

    #[error("opencast error: {0}")]
    OpencastError(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: usize, last_error: Box<SinkError> },
}

impl SinkError {
    /// §7: transport and mediapackage-parse failures are retryable; schema
    /// and config problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Http(e) => e.is_timeout() || e.is_connect() || e.status().map(|s| s.is_server_error()).unwrap_or(true),
            SinkError::Io(_) => true,
            SinkError::Xml(_) => true,
            SinkError::MediapackageInvalid(_) => true,
            SinkError::FileMissing(_) => true,
            SinkError::SizeMismatch { .. } => true,
            SinkError::OpencastError(_) => true,
            SinkError::Config(_) => false,
            SinkError::Auth(_) => false,
            SinkError::NotFound(_) => false,
            SinkError::RetryExhausted { .. } => false,
        }
    }
}

impl From<SinkError> for crate::domain::PipelineError {
    fn from(e: SinkError) -> Self {
        match e {
            SinkError::MediapackageInvalid(m) => crate::domain::PipelineError::MediapackageInvalid(m),
            SinkError::FileMissing(m) => crate::domain::PipelineError::FileMissing(m),
            SinkError::SizeMismatch { expected, found } => crate::domain::PipelineError::SizeMismatch { expected, found },
            SinkError::OpencastError(m) => crate::domain::PipelineError::OpencastError(m),
            other => crate::domain::PipelineError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_terminal() {
        assert!(!SinkError::Config("bad url".into()).is_retryable());
    }

    #[test]
    fn mediapackage_invalid_is_retryable() {
        assert!(SinkError::MediapackageInvalid("unexpected eof".into()).is_retryable());
    }

    #[test]
    fn opencast_error_is_retryable() {
        assert!(SinkError::OpencastError("series create returned 500".into()).is_retryable());
    }
}
