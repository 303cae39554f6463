//! Error types for the pipeline crate.

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while running the detection pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Media error: {0}")]
    Media(#[from] gearlens_media::MediaError),

    #[error("Oracle request failed: {0}")]
    OracleFailed(String),

    #[error("Oracle returned malformed JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create an oracle failure error.
    pub fn oracle_failed(message: impl Into<String>) -> Self {
        Self::OracleFailed(message.into())
    }

    /// Create a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
