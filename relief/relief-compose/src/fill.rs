//! Gap-fill geometry between a scaled-down overlay and the base boundary.

use geo::{Area, BooleanOps, Contains};
use relief_types::Solid;
use tracing::{debug, info};

use crate::error::ComposeResult;
use crate::footprint::{extrude_polygon, footprint_hull};

/// Gap regions smaller than this are ignored (mm^2).
const MIN_GAP_AREA: f64 = 1e-6;

/// Fill extrusions are never thinner than this (mm).
const MIN_FILL_THICKNESS: f64 = 0.2;

/// Build fill geometry for the area of the base top left uncovered by the
/// clipped overlay.
///
/// The fill extrudes the 2D difference `hull(base) - hull(overlay)` from
/// the base's top up to `fill_height` (the overlay's detected background
/// height). Returns `Ok(None)` when the overlay already covers the base or
/// the gap is negligible; that is a logged no-op, not an error.
///
/// # Errors
///
/// Propagates footprint/triangulation failures from the 2D stage.
pub fn build_fill_geometry(
    base: &Solid,
    clipped_overlay: &Solid,
    fill_height: f64,
    base_top_z: f64,
) -> ComposeResult<Option<Solid>> {
    let base_hull = footprint_hull(base)?;
    let overlay_hull = footprint_hull(clipped_overlay)?;

    if overlay_hull.contains(&base_hull) || overlay_hull == base_hull {
        info!("overlay covers the entire base footprint; no gap to fill");
        return Ok(None);
    }

    let gap = base_hull.difference(&overlay_hull);
    let gap_area = gap.unsigned_area();
    if gap_area < MIN_GAP_AREA {
        info!("gap area is negligible; no fill geometry created");
        return Ok(None);
    }
    debug!(area_mm2 = format!("{gap_area:.2}"), "gap region detected");

    let thickness = (fill_height - base_top_z).max(MIN_FILL_THICKNESS);
    debug!(
        thickness_mm = format!("{thickness:.3}"),
        base_top_mm = format!("{base_top_z:.3}"),
        "extruding fill geometry"
    );

    let mut fill = Solid::new();
    let mut regions = 0_usize;
    for polygon in &gap {
        if polygon.unsigned_area() < MIN_GAP_AREA {
            continue;
        }
        let prism = extrude_polygon(polygon, base_top_z, thickness)?;
        fill.merge(&prism);
        regions += 1;
    }

    if fill.is_empty() {
        info!("all gap regions were below the area threshold");
        return Ok(None);
    }
    info!(
        regions,
        vertices = fill.vertex_count(),
        faces = fill.face_count(),
        "fill geometry created"
    );
    Ok(Some(fill))
}
