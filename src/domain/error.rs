//! Crate-wide error taxonomy (§7). Each subsystem boundary has its own error
//! enum; `PipelineError` aggregates them at the point where the engine
//! decides terminal-vs-reapable.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Schema violation on a Source payload. Surfaced as 400 at intake;
    /// raised (not retried) mid-pipeline.
    #[error("bad webhook data: {0}")]
    BadWebhookData(String),

    /// No acceptable video track found among a recording's files.
    /// Retryable inside the engine (the Source's file set may still be
    /// finalizing); terminal (400) at intake.
    #[error("no mp4 files: {0}")]
    NoMp4Files(String),

    /// Connection/5xx/429 from any remote collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// XML parse failure on an intermediate Sink mediapackage response.
    #[error("mediapackage invalid: {0}")]
    MediapackageInvalid(String),

    /// Local filesystem inconsistency (missing download, size mismatch).
    #[error("file missing: {0}")]
    FileMissing(String),

    #[error("size mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: u64, found: u64 },

    /// Non-2xx response from the Sink at a terminal operation.
    #[error("opencast error: {0}")]
    OpencastError(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl PipelineError {
    /// Stable variant name for metrics labels and log fields (§10.5); never
    /// the `Display` message, which can carry unbounded detail.
    pub fn taxonomy(&self) -> &'static str {
        match self {
            PipelineError::BadWebhookData(_) => "BadWebhookData",
            PipelineError::NoMp4Files(_) => "NoMp4Files",
            PipelineError::Transport(_) => "Transport",
            PipelineError::MediapackageInvalid(_) => "MediapackageInvalid",
            PipelineError::FileMissing(_) => "FileMissing",
            PipelineError::SizeMismatch { .. } => "SizeMismatch",
            PipelineError::OpencastError(_) => "OpencastError",
            PipelineError::Storage(_) => "Storage",
            PipelineError::Broker(_) => "Broker",
            PipelineError::Config(_) => "Config",
            PipelineError::NotFound(_) => "NotFound",
        }
    }

    /// Whether the engine should return the owning Ingest to a reapable
    /// (non-terminal) state rather than marking it permanently failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::BadWebhookData(_) => false,
            PipelineError::NoMp4Files(_) => true,
            PipelineError::Transport(_) => true,
            PipelineError::MediapackageInvalid(_) => true,
            PipelineError::FileMissing(_) => true,
            PipelineError::SizeMismatch { .. } => true,
            PipelineError::OpencastError(_) => true,
            PipelineError::Storage(_) => false,
            PipelineError::Broker(_) => true,
            PipelineError::Config(_) => false,
            PipelineError::NotFound(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_webhook_data_is_terminal() {
        assert!(!PipelineError::BadWebhookData("x".into()).is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable() {
        assert!(PipelineError::Transport("timeout".into()).is_retryable());
    }

    #[test]
    fn no_mp4_files_is_retryable_mid_pipeline() {
        assert!(PipelineError::NoMp4Files("none".into()).is_retryable());
    }
}
