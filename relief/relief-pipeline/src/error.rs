//! Error type for pipeline runs.

use thiserror::Error;

use crate::export::ExportError;

/// Result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that abort a pipeline run.
///
/// Geometry failures (alignment, boolean composition) and export
/// failures are fatal; metadata problems are downgraded to warnings in
/// the [`crate::PipelineReport`] instead of surfacing here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run configuration is unusable.
    #[error("invalid configuration: {message}")]
    Config {
        /// What was wrong with it.
        message: String,
    },

    /// Aligning the overlay onto the base failed.
    #[error(transparent)]
    Align(#[from] relief_align::AlignError),

    /// Composing the solids failed.
    #[error(transparent)]
    Compose(#[from] relief_compose::ComposeError),

    /// A source package could not be read.
    #[error(transparent)]
    Colors(#[from] relief_colors::ColorError),

    /// Package I/O or rebuilding failed.
    #[error(transparent)]
    Pack(#[from] relief_pack::PackError),

    /// The slicer export failed.
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl PipelineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
