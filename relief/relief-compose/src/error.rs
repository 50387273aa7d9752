//! Error types for the composition stage.

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that abort a composition run.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The base footprint collapses to nothing in the XY plane.
    #[error("base footprint hull is empty: {details}")]
    EmptyFootprint {
        /// What made the hull degenerate.
        details: String,
    },

    /// Clipping the overlay against the base footprint produced no
    /// geometry; the solids do not overlap or the base is not a volume.
    #[error("clip result is empty: overlay does not overlap the base footprint")]
    EmptyClip,

    /// The external boolean engine rejected or failed an operation.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
