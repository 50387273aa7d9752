//! Composition orchestration: clip, fill, union.

use relief_types::Solid;
use tracing::{debug, info, warn};

use crate::background::sample_background_height;
use crate::engine::BooleanEngine;
use crate::error::{ComposeError, ComposeResult};
use crate::fill::build_fill_geometry;
use crate::footprint::{extrude_polygon, footprint_hull};

/// Height of the clipping prism. Tall enough to cover any overlay placed
/// on a base (mm).
const CUTTER_HEIGHT_MM: f64 = 500.0;

/// How far below the base bottom the clipping prism starts (mm).
const CUTTER_MARGIN_MM: f64 = 1.0;

/// Parameters controlling the composition stage.
#[derive(Debug, Clone, Copy)]
pub struct ComposeParams {
    /// Synthesize fill geometry where a scaled-down overlay leaves the
    /// base's top surface exposed.
    pub fill_gaps: bool,
}

impl Default for ComposeParams {
    fn default() -> Self {
        Self { fill_gaps: true }
    }
}

/// Result of a composition run.
#[derive(Debug, Clone)]
pub struct Composition {
    /// The unioned solid: base + clipped overlay (+ fill).
    pub solid: Solid,
    /// The background height detected on the overlay, used as the fill
    /// ceiling. Present even when no fill was produced.
    pub background_height: f64,
    /// Whether fill geometry was synthesized and included in the union.
    pub fill_added: bool,
}

/// Compose an aligned overlay onto its base.
///
/// The overlay is clipped against a prism extruded from the convex hull of
/// the base footprint, so no overlay geometry hangs past the base edge.
/// When `params.fill_gaps` is set and the clipped overlay does not cover
/// the whole base top, the uncovered ring is filled up to the overlay's
/// detected background height. The final solid is the engine union of all
/// parts. Inputs are not mutated.
///
/// # Errors
///
/// * [`ComposeError::EmptyFootprint`] when the base has no usable footprint
/// * [`ComposeError::EmptyClip`] when the overlay does not overlap the base
/// * [`ComposeError::Engine`] when the boolean engine fails
pub fn compose<E: BooleanEngine>(
    engine: &E,
    base: &Solid,
    overlay: &Solid,
    params: &ComposeParams,
) -> ComposeResult<Composition> {
    let base_bounds = base.bounds();
    let hull = footprint_hull(base)?;
    let cutter = extrude_polygon(
        &hull,
        base_bounds.bottom_z() - CUTTER_MARGIN_MM,
        CUTTER_HEIGHT_MM,
    )?;
    debug!(
        vertices = cutter.vertex_count(),
        faces = cutter.face_count(),
        "clipping prism built from base footprint"
    );

    // The background height must come from the full overlay: clipping can
    // remove the very perimeter the sampler keys on.
    let background_height = sample_background_height(overlay);

    let clipped = engine.intersection(overlay, &cutter)?;
    if clipped.is_empty() {
        return Err(ComposeError::EmptyClip);
    }
    info!(
        faces_before = overlay.face_count(),
        faces_after = clipped.face_count(),
        "overlay clipped to base footprint"
    );

    let mut parts: Vec<Solid> = vec![base.clone(), clipped.clone()];
    let mut fill_added = false;
    if params.fill_gaps {
        match build_fill_geometry(base, &clipped, background_height, base_bounds.top_z()) {
            Ok(Some(fill)) => {
                parts.push(fill);
                fill_added = true;
            }
            Ok(None) => {}
            Err(err) => {
                // Fill is an enhancement; a degenerate gap never aborts
                // the composition.
                warn!(error = %err, "gap fill skipped");
            }
        }
    }

    let solid = engine.union(&parts)?;
    info!(
        vertices = solid.vertex_count(),
        faces = solid.face_count(),
        fill_added,
        "composition complete"
    );
    Ok(Composition {
        solid,
        background_height,
        fill_added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, EngineResult};
    use nalgebra::{Point3, Vector3};
    use relief_types::rectangular_slab;

    /// Clips by axis-aligned bounds and unions by concatenation. Good
    /// enough to drive the orchestration paths deterministically.
    struct StubEngine;

    impl BooleanEngine for StubEngine {
        fn union(&self, parts: &[Solid]) -> EngineResult<Solid> {
            let mut out = Solid::new();
            for part in parts {
                out.merge(part);
            }
            Ok(out)
        }

        fn intersection(&self, a: &Solid, b: &Solid) -> EngineResult<Solid> {
            let bb = b.bounds();
            let inside = a
                .vertices
                .iter()
                .all(|v| v.x >= bb.min.x - 1e-9 && v.x <= bb.max.x + 1e-9);
            if inside {
                Ok(a.clone())
            } else {
                Ok(Solid::new())
            }
        }
    }

    struct FailingEngine;

    impl BooleanEngine for FailingEngine {
        fn union(&self, _parts: &[Solid]) -> EngineResult<Solid> {
            Err(EngineError::NotAVolume {
                details: "base has open edges".to_string(),
            })
        }

        fn intersection(&self, a: &Solid, _b: &Solid) -> EngineResult<Solid> {
            Ok(a.clone())
        }
    }

    fn base() -> Solid {
        rectangular_slab(Point3::origin(), Vector3::new(100.0, 100.0, 10.0))
    }

    #[test]
    fn overlay_inside_base_composes_without_fill_gap_error() {
        let overlay = rectangular_slab(Point3::new(25.0, 0.0, 10.0), Vector3::new(50.0, 100.0, 2.0));
        let result = compose(&StubEngine, &base(), &overlay, &ComposeParams::default()).unwrap();
        assert!(result.fill_added);
        assert!(result.solid.face_count() > base().face_count());
    }

    #[test]
    fn covering_overlay_skips_fill() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(100.0, 100.0, 2.0));
        let result = compose(&StubEngine, &base(), &overlay, &ComposeParams::default()).unwrap();
        assert!(!result.fill_added);
    }

    #[test]
    fn fill_can_be_disabled() {
        let overlay = rectangular_slab(Point3::new(25.0, 0.0, 10.0), Vector3::new(50.0, 100.0, 2.0));
        let params = ComposeParams { fill_gaps: false };
        let result = compose(&StubEngine, &base(), &overlay, &params).unwrap();
        assert!(!result.fill_added);
    }

    #[test]
    fn non_overlapping_overlay_is_an_empty_clip() {
        let overlay = rectangular_slab(Point3::new(500.0, 0.0, 0.0), Vector3::new(10.0, 10.0, 2.0));
        let err = compose(&StubEngine, &base(), &overlay, &ComposeParams::default()).unwrap_err();
        assert!(matches!(err, ComposeError::EmptyClip));
    }

    #[test]
    fn engine_failure_propagates() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(100.0, 100.0, 2.0));
        let err = compose(&FailingEngine, &base(), &overlay, &ComposeParams::default()).unwrap_err();
        assert!(matches!(err, ComposeError::Engine(_)));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let b = base();
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(100.0, 100.0, 2.0));
        let before = b.vertices.clone();
        compose(&StubEngine, &b, &overlay, &ComposeParams::default()).unwrap();
        assert_eq!(b.vertices, before);
    }
}
