//! Error types for color-layer extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for color-layer operations.
pub type ColorResult<T> = Result<T, ColorError>;

/// Errors that can occur while reading color metadata.
///
/// Broken metadata *content* is not an error here; it is reported as
/// [`crate::Extraction::Malformed`] so callers can distinguish it from
/// file-level failures.
#[derive(Debug, Error)]
pub enum ColorError {
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

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
