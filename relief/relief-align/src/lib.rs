//! Overlay-on-base alignment for the ReliefForge pipeline.
//!
//! Positions a relief overlay on top of a base solid through a fixed chain
//! of transforms:
//!
//! 1. rotate the base about Z (never the overlay)
//! 2. scale the overlay in XY so it fills at least one base dimension
//! 3. center the overlay on the base in XY
//! 4. drop the overlay onto the base top, then embed it by a small overlap
//! 5. apply user X/Y/Z shifts
//!
//! The chain also produces the cumulative Z displacement applied to the
//! overlay's local frame (the "Z-offset ledger"). Color-swap heights are
//! authored in the overlay's original frame; every downstream consumer of
//! those heights must add this offset. Reordering the steps changes the
//! ledger's meaning and breaks height-range synthesis.
//!
//! # Example
//!
//! ```
//! use nalgebra::{Point3, Vector3};
//! use relief_align::{align_overlay, AlignParams};
//! use relief_types::rectangular_slab;
//!
//! let base = rectangular_slab(Point3::origin(), Vector3::new(100.0, 100.0, 10.0));
//! let overlay = rectangular_slab(Point3::origin(), Vector3::new(50.0, 40.0, 2.0));
//!
//! let aligned = align_overlay(base, overlay, &AlignParams::default()).unwrap();
//! // overlay bottom now sits 0.1 mm below the base top
//! assert!((aligned.z_offset - 9.9).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

use nalgebra::Vector3;
use relief_types::Solid;
use thiserror::Error;
use tracing::{debug, info};

/// Default interpenetration between overlay bottom and base top, in mm.
///
/// Two solids meeting at an exactly coincident surface make the boolean
/// union numerically unstable; a slight embed avoids that by construction.
pub const DEFAULT_EMBED_OVERLAP_MM: f64 = 0.1;

/// Errors from the alignment stage. All variants abort the pipeline.
#[derive(Debug, Error)]
pub enum AlignError {
    /// A footprint used as the divisor in auto-scaling has zero extent.
    #[error("degenerate {which} footprint: zero extent in {axis}")]
    DegenerateFootprint {
        /// Which solid ("base" or "overlay").
        which: &'static str,
        /// Offending axis ("X" or "Y").
        axis: &'static str,
    },
}

/// Result type for alignment operations.
pub type AlignResult<T> = Result<T, AlignError>;

/// How the overlay's XY scale is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleMode {
    /// Compute `max(base_w / overlay_w, base_d / overlay_d)`. Values below
    /// 1.0 are clamped to 1.0 unless `allow_scaledown` is set.
    Auto {
        /// Permit shrinking the overlay below its authored size.
        allow_scaledown: bool,
    },
    /// Use this exact factor, no clamping.
    Forced(f64),
}

impl Default for ScaleMode {
    fn default() -> Self {
        Self::Auto {
            allow_scaledown: false,
        }
    }
}

/// Parameters for [`align_overlay`].
#[derive(Debug, Clone)]
pub struct AlignParams {
    /// Base rotation about Z, in degrees.
    pub rotate_base_degrees: f64,
    /// Overlay XY scaling strategy.
    pub scale: ScaleMode,
    /// User-requested shift applied to the overlay after embedding, in mm.
    pub shift: Vector3<f64>,
    /// Embedding overlap in mm; see [`DEFAULT_EMBED_OVERLAP_MM`].
    pub embed_overlap_mm: f64,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            rotate_base_degrees: 0.0,
            scale: ScaleMode::default(),
            shift: Vector3::zeros(),
            embed_overlap_mm: DEFAULT_EMBED_OVERLAP_MM,
        }
    }
}

/// Output of the alignment stage.
#[derive(Debug)]
pub struct AlignedPair {
    /// The base, rotated if requested.
    pub base: Solid,
    /// The overlay, scaled, centered, embedded and shifted.
    pub overlay: Solid,
    /// Cumulative Z displacement applied to the overlay's local frame,
    /// including the user Z shift. Add this to overlay-local layer heights
    /// to obtain absolute heights in the combined object.
    pub z_offset: f64,
    /// The uniform XY scale factor actually applied.
    pub applied_scale: f64,
}

/// Align `overlay` on top of `base`.
///
/// Consumes both solids and returns new positioned geometry plus the
/// Z-offset ledger. The step order is fixed; see the crate docs.
///
/// # Errors
///
/// [`AlignError::DegenerateFootprint`] when auto-scaling would divide by a
/// zero-extent footprint dimension. This is a configuration error, never
/// silently skipped.
pub fn align_overlay(
    mut base: Solid,
    mut overlay: Solid,
    params: &AlignParams,
) -> AlignResult<AlignedPair> {
    // 1) Rotate the base, never the overlay.
    if params.rotate_base_degrees != 0.0 {
        info!(degrees = params.rotate_base_degrees, "rotating base about Z");
        base.rotate_z(params.rotate_base_degrees.to_radians());
    }

    // 2) Scale the overlay in XY so it fills at least one base dimension.
    let base_bounds = base.bounds();
    let overlay_bounds = overlay.bounds();

    let applied_scale = match params.scale {
        ScaleMode::Forced(scale) => {
            info!(scale, "using forced overlay scale");
            scale
        }
        ScaleMode::Auto { allow_scaledown } => {
            check_extent("overlay", "X", overlay_bounds.width())?;
            check_extent("overlay", "Y", overlay_bounds.depth())?;
            check_extent("base", "X", base_bounds.width())?;
            check_extent("base", "Y", base_bounds.depth())?;

            let scale_x = base_bounds.width() / overlay_bounds.width();
            let scale_y = base_bounds.depth() / overlay_bounds.depth();
            let mut scale = scale_x.max(scale_y);
            debug!(scale_x, scale_y, uniform = scale, "computed auto scale");

            if scale < 1.0 && !allow_scaledown {
                info!(computed = scale, "clamping scale to 1.0 (scaledown not allowed)");
                scale = 1.0;
            }
            scale
        }
    };
    overlay.scale_xy(applied_scale);

    // 3) Center the overlay on the base in XY.
    let overlay_bounds = overlay.bounds();
    let base_center = base_bounds.center();
    let overlay_center = overlay_bounds.center();
    let centering = Vector3::new(
        base_center.x - overlay_center.x,
        base_center.y - overlay_center.y,
        0.0,
    );
    overlay.translate(centering);
    debug!(dx = centering.x, dy = centering.y, "centered overlay on base");

    // 4) Drop onto the base top, then embed.
    let base_top_z = base_bounds.top_z();
    let overlay_bottom_z = overlay.bounds().bottom_z();
    overlay.translate(Vector3::new(0.0, 0.0, base_top_z - overlay_bottom_z));
    overlay.translate(Vector3::new(0.0, 0.0, -params.embed_overlap_mm));
    info!(
        overlap_mm = params.embed_overlap_mm,
        "embedded overlay into base"
    );

    // Ledger value before user shifts.
    let z_offset_pre_shift = base_top_z - params.embed_overlap_mm;

    // 5) User shifts; the Z component joins the ledger.
    if params.shift != Vector3::zeros() {
        info!(
            x = params.shift.x,
            y = params.shift.y,
            z = params.shift.z,
            "applying user shift to overlay"
        );
        overlay.translate(params.shift);
    }
    let z_offset = z_offset_pre_shift + params.shift.z;

    Ok(AlignedPair {
        base,
        overlay,
        z_offset,
        applied_scale,
    })
}

fn check_extent(which: &'static str, axis: &'static str, extent: f64) -> AlignResult<()> {
    if extent <= 0.0 {
        return Err(AlignError::DegenerateFootprint { which, axis });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use relief_types::rectangular_slab;

    fn base_100x100x10() -> Solid {
        rectangular_slab(Point3::origin(), Vector3::new(100.0, 100.0, 10.0))
    }

    #[test]
    fn auto_scale_fills_one_dimension() {
        // 100x100 base over a 50x40 overlay: max(2.0, 2.5) = 2.5.
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(50.0, 40.0, 2.0));
        let aligned =
            align_overlay(base_100x100x10(), overlay, &AlignParams::default()).unwrap();

        assert_relative_eq!(aligned.applied_scale, 2.5);
        let bounds = aligned.overlay.bounds();
        assert_relative_eq!(bounds.width(), 125.0);
        assert_relative_eq!(bounds.depth(), 100.0);
        // Z extent untouched by XY scaling.
        assert_relative_eq!(bounds.height(), 2.0);
    }

    #[test]
    fn scale_below_one_clamped_by_default() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(200.0, 200.0, 2.0));
        let aligned =
            align_overlay(base_100x100x10(), overlay, &AlignParams::default()).unwrap();
        assert_relative_eq!(aligned.applied_scale, 1.0);
    }

    #[test]
    fn scaledown_allowed_when_requested() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(200.0, 200.0, 2.0));
        let params = AlignParams {
            scale: ScaleMode::Auto {
                allow_scaledown: true,
            },
            ..AlignParams::default()
        };
        let aligned = align_overlay(base_100x100x10(), overlay, &params).unwrap();
        assert_relative_eq!(aligned.applied_scale, 0.5);
    }

    #[test]
    fn forced_scale_is_never_clamped() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(50.0, 40.0, 2.0));
        let params = AlignParams {
            scale: ScaleMode::Forced(0.25),
            ..AlignParams::default()
        };
        let aligned = align_overlay(base_100x100x10(), overlay, &params).unwrap();
        assert_relative_eq!(aligned.applied_scale, 0.25);
        assert_relative_eq!(aligned.overlay.bounds().width(), 12.5);
    }

    #[test]
    fn unit_scale_roundtrip_ledger() {
        // An overlay already centered on the base and sitting exactly on its
        // top: no rotation, forced scale 1, no shifts. The only movement is
        // the embed, so the ledger must equal base_top - overlap and the XY
        // center must be unchanged.
        let base = base_100x100x10();
        let mut overlay = rectangular_slab(Point3::origin(), Vector3::new(100.0, 100.0, 2.0));
        overlay.translate(Vector3::new(0.0, 0.0, 10.0));

        let params = AlignParams {
            scale: ScaleMode::Forced(1.0),
            ..AlignParams::default()
        };
        let aligned = align_overlay(base, overlay, &params).unwrap();

        assert_relative_eq!(aligned.z_offset, 10.0 - DEFAULT_EMBED_OVERLAP_MM);
        let center = aligned.overlay.bounds().center();
        assert_relative_eq!(center.x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(center.y, 50.0, epsilon = 1e-9);
        assert_relative_eq!(
            aligned.overlay.bounds().bottom_z(),
            10.0 - DEFAULT_EMBED_OVERLAP_MM,
            epsilon = 1e-9
        );
    }

    #[test]
    fn user_z_shift_joins_ledger() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(50.0, 50.0, 2.0));
        let params = AlignParams {
            shift: Vector3::new(3.0, -2.0, 1.5),
            ..AlignParams::default()
        };
        let aligned = align_overlay(base_100x100x10(), overlay, &params).unwrap();
        assert_relative_eq!(aligned.z_offset, 10.0 - DEFAULT_EMBED_OVERLAP_MM + 1.5);
    }

    #[test]
    fn base_rotation_never_touches_overlay() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(30.0, 60.0, 2.0));
        let base = rectangular_slab(Point3::origin(), Vector3::new(40.0, 80.0, 10.0));
        let params = AlignParams {
            rotate_base_degrees: 90.0,
            scale: ScaleMode::Forced(1.0),
            ..AlignParams::default()
        };
        let aligned = align_overlay(base, overlay, &params).unwrap();
        // Base extents swapped by the quarter turn; overlay extents intact.
        assert_relative_eq!(aligned.base.bounds().width(), 80.0, epsilon = 1e-9);
        assert_relative_eq!(aligned.base.bounds().depth(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(aligned.overlay.bounds().width(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_overlay_footprint_is_fatal() {
        // Zero-width overlay: all vertices on a YZ plane.
        let overlay = Solid::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2]],
        );
        let err = align_overlay(base_100x100x10(), overlay, &AlignParams::default());
        assert!(matches!(
            err,
            Err(AlignError::DegenerateFootprint {
                which: "overlay",
                axis: "X"
            })
        ));
    }

    #[test]
    fn overlap_is_configurable_per_run() {
        let overlay = rectangular_slab(Point3::origin(), Vector3::new(50.0, 50.0, 2.0));
        let params = AlignParams {
            embed_overlap_mm: 0.3,
            ..AlignParams::default()
        };
        let aligned = align_overlay(base_100x100x10(), overlay, &params).unwrap();
        assert_relative_eq!(aligned.z_offset, 9.7);
    }
}
