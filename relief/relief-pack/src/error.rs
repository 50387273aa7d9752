//! Error types for package I/O and rebuilding.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for package operations.
pub type PackResult<T> = Result<T, PackError>;

/// Errors that can occur while reading, rewriting or repacking a 3MF.
#[derive(Debug, Error)]
pub enum PackError {
    /// Package file not found.
    #[error("package not found: {path}")]
    PackageNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// The package is not a readable ZIP archive.
    #[error("invalid package archive: {message}")]
    InvalidArchive {
        /// Description of what was invalid.
        message: String,
    },

    /// A document inside the package could not be parsed or written.
    #[error("invalid package content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// A required package entry is missing.
    #[error("package entry missing: {name}")]
    MissingEntry {
        /// Archive-relative entry name.
        name: String,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UTF-8 decoding error.
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// String conversion error.
    #[error("string conversion error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),
}

impl PackError {
    /// Create an `InvalidContent` error with the given message.
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }

    /// Create an `InvalidArchive` error with the given message.
    pub fn invalid_archive(message: impl Into<String>) -> Self {
        Self::InvalidArchive {
            message: message.into(),
        }
    }
}
