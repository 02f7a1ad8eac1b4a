//! Error types for the ingestion pipeline

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion pipeline errors
///
/// Only `CorruptContainer` is terminal for a file; everything else either skips
/// the file cleanly (`Unsupported`, `PasswordProtected`) or degrades to partial
/// output (`MalformedRecord`, `CaptionUnavailable`).
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown or unhandled file format
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    /// Password protection detected before any content parse was attempted
    #[error("File '{0}' is password protected")]
    PasswordProtected(String),

    /// The OLE/zip container itself cannot be opened
    #[error("Corrupt container in '{filename}': {message}")]
    CorruptContainer { filename: String, message: String },

    /// A single record failed to parse; callers skip and continue
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// External captioning collaborator failed; degrades to empty description
    #[error("Caption unavailable: {0}")]
    CaptionUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a corrupt container error
    pub fn corrupt_container(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptContainer {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a malformed record error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord(message.into())
    }

    /// Create a caption error
    pub fn caption(message: impl Into<String>) -> Self {
        Self::CaptionUnavailable(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the error only affects one file and the batch should continue
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Internal(_))
    }
}
