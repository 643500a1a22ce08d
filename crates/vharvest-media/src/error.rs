//! Error types for extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while running the extraction process.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp not found: {0}")]
    YtDlpNotFound(String),

    /// The source reports itself as unplayable. Retrying cannot help.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Extraction failed: {message}")]
    ExtractionFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Extraction produced no usable output: {0}")]
    EmptyOutput(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an extraction failure error.
    pub fn extraction_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::ExtractionFailed {
            message: message.into(),
            exit_code,
        }
    }

    /// Whether the source itself is gone (classified Invalid, never retried).
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, MediaError::SourceUnavailable(_))
    }
}
