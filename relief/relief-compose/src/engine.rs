//! The external boolean-engine capability.
//!
//! 3D CSG is consumed as a capability, never implemented here: given
//! manifold solids, an engine returns their union or intersection, or
//! fails. Pipeline callers inject a production engine; tests inject
//! deterministic stubs.

use relief_types::Solid;
use thiserror::Error;

/// Errors surfaced by a boolean engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An input (or the result) is not a closed volume. Callers surface
    /// this distinctly from generic failures.
    #[error("not a volume: {details}")]
    NotAVolume {
        /// Which solid failed the watertightness check.
        details: String,
    },

    /// The operation itself failed (numerical breakdown, engine crash).
    #[error("boolean operation failed: {details}")]
    OperationFailed {
        /// Engine-provided failure description.
        details: String,
    },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A 3D boolean (CSG) engine.
///
/// Implementations must not mutate their inputs; every operation returns a
/// new solid.
pub trait BooleanEngine {
    /// Union of all `parts` into a single manifold solid.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when a part is not a volume or the union fails.
    fn union(&self, parts: &[Solid]) -> EngineResult<Solid>;

    /// Intersection of `a` with `b`.
    ///
    /// An empty result (no overlap) is returned as an empty [`Solid`],
    /// not an error; the caller decides whether emptiness is fatal.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when an input is not a volume or the operation fails.
    fn intersection(&self, a: &Solid, b: &Solid) -> EngineResult<Solid>;
}
