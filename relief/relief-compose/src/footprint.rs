//! 2D footprint hulls and prism extrusion.

use geo::orient::{Direction, Orient};
use geo::{Area, ConvexHull, Coord, MultiPoint, Point, Polygon};
use nalgebra::Point3;
use relief_types::Solid;

use crate::error::{ComposeError, ComposeResult};

/// Footprints narrower than this are treated as degenerate (mm^2).
const MIN_HULL_AREA: f64 = 1e-9;

/// Convex hull of a solid's XY footprint.
///
/// # Errors
///
/// [`ComposeError::EmptyFootprint`] when the solid has no vertices or all
/// vertices project onto a line or point.
pub fn footprint_hull(solid: &Solid) -> ComposeResult<Polygon<f64>> {
    if solid.vertices.is_empty() {
        return Err(ComposeError::EmptyFootprint {
            details: "solid has no vertices".to_string(),
        });
    }

    let points: MultiPoint<f64> = solid
        .vertices
        .iter()
        .map(|v| Point::new(v.x, v.y))
        .collect();
    let hull = points.convex_hull();

    if hull.unsigned_area() < MIN_HULL_AREA {
        return Err(ComposeError::EmptyFootprint {
            details: "all vertices are collinear in XY".to_string(),
        });
    }
    Ok(hull)
}

/// Extrude a polygon (with holes) into a prism from `z0` to `z0 + height`.
///
/// Caps are triangulated with ear clipping so gap regions with holes or
/// concavities extrude correctly; side walls are quad strips along every
/// ring.
///
/// # Errors
///
/// [`ComposeError::EmptyFootprint`] when the polygon cannot be
/// triangulated.
pub fn extrude_polygon(polygon: &Polygon<f64>, z0: f64, height: f64) -> ComposeResult<Solid> {
    // Normalize winding: exterior CCW, interiors CW.
    let polygon = polygon.orient(Direction::Default);

    let mut rings: Vec<Vec<Coord<f64>>> = Vec::with_capacity(1 + polygon.interiors().len());
    rings.push(ring_coords(polygon.exterior().0.as_slice()));
    for interior in polygon.interiors() {
        rings.push(ring_coords(interior.0.as_slice()));
    }

    let mut flat = Vec::new();
    let mut hole_indices = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            hole_indices.push(flat.len() / 2);
        }
        for c in ring {
            flat.push(c.x);
            flat.push(c.y);
        }
    }

    let cap = earcutr::earcut(&flat, &hole_indices, 2).map_err(|e| {
        ComposeError::EmptyFootprint {
            details: format!("cap triangulation failed: {e:?}"),
        }
    })?;
    if cap.is_empty() {
        return Err(ComposeError::EmptyFootprint {
            details: "cap triangulation produced no triangles".to_string(),
        });
    }

    let ring_points: Vec<Coord<f64>> = rings.into_iter().flatten().collect();
    let n = ring_points.len() as u32;
    let z1 = z0 + height;

    let mut solid = Solid::new();
    // Bottom vertices [0, n), top vertices [n, 2n).
    for c in &ring_points {
        solid.vertices.push(Point3::new(c.x, c.y, z0));
    }
    for c in &ring_points {
        solid.vertices.push(Point3::new(c.x, c.y, z1));
    }

    // Caps. Flip the ear-clip output if it came out facing -Z so the top
    // cap always faces up and the bottom (reversed) faces down.
    let flip = cap_faces_down(&cap, &ring_points);
    for tri in cap.chunks_exact(3) {
        let (a, b, c) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
        let (a, b, c) = if flip { (a, c, b) } else { (a, b, c) };
        solid.faces.push([n + a, n + b, n + c]); // top, +Z
        solid.faces.push([a, c, b]); // bottom, -Z
    }

    // Side walls, one quad per ring edge. With exterior CCW and interiors
    // CW, this winding faces outward on both.
    let mut ring_starts = vec![0_usize];
    ring_starts.extend(hole_indices.iter().copied());
    for (i, &ring_start) in ring_starts.iter().enumerate() {
        let ring_end = ring_starts.get(i + 1).copied().unwrap_or(ring_points.len());
        let ring_len = (ring_end - ring_start) as u32;
        let base = ring_start as u32;
        for k in 0..ring_len {
            let b0 = base + k;
            let b1 = base + (k + 1) % ring_len;
            solid.faces.push([b0, b1, n + b1]);
            solid.faces.push([b0, n + b1, n + b0]);
        }
    }

    Ok(solid)
}

/// Ring coordinates without the closing duplicate point.
fn ring_coords(closed: &[Coord<f64>]) -> Vec<Coord<f64>> {
    match closed {
        [rest @ .., last] if rest.first() == Some(last) => rest.to_vec(),
        other => other.to_vec(),
    }
}

/// Whether the ear-clip cap triangles face -Z (negative total signed area).
fn cap_faces_down(cap: &[usize], points: &[Coord<f64>]) -> bool {
    let mut doubled_area = 0.0;
    for tri in cap.chunks_exact(3) {
        let (p0, p1, p2) = (points[tri[0]], points[tri[1]], points[tri[2]]);
        doubled_area += (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y);
    }
    doubled_area < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use relief_types::rectangular_slab;

    #[test]
    fn hull_of_slab_footprint() {
        let slab = rectangular_slab(Point3::origin(), Vector3::new(10.0, 20.0, 5.0));
        let hull = footprint_hull(&slab).unwrap();
        assert_relative_eq!(hull.unsigned_area(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn hull_of_empty_solid_fails() {
        assert!(matches!(
            footprint_hull(&Solid::new()),
            Err(ComposeError::EmptyFootprint { .. })
        ));
    }

    #[test]
    fn hull_of_collinear_vertices_fails() {
        let line = Solid::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(2.0, 0.0, 2.0),
            ],
            vec![[0, 1, 2]],
        );
        assert!(footprint_hull(&line).is_err());
    }

    #[test]
    fn extruded_square_has_expected_extents() {
        use geo::polygon;
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 4.0),
        ];
        let prism = extrude_polygon(&square, 2.0, 10.0).unwrap();
        let bounds = prism.bounds();
        assert_relative_eq!(bounds.bottom_z(), 2.0);
        assert_relative_eq!(bounds.top_z(), 12.0);
        assert_relative_eq!(bounds.width(), 4.0);
        // 2 cap triangles top + 2 bottom + 8 wall triangles.
        assert_eq!(prism.face_count(), 12);
    }

    #[test]
    fn extruded_ring_keeps_hole_walls() {
        use geo::{polygon, LineString, Polygon};
        let outer = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ];
        let hole = LineString::from(vec![
            (3.0, 3.0),
            (7.0, 3.0),
            (7.0, 7.0),
            (3.0, 7.0),
            (3.0, 3.0),
        ]);
        let ring = Polygon::new(outer.exterior().clone(), vec![hole]);
        let prism = extrude_polygon(&ring, 0.0, 1.0).unwrap();
        // 8 ring points -> 16 wall triangles, 8 cap triangles per side.
        assert_eq!(prism.vertex_count(), 16);
        assert_eq!(prism.face_count(), 32);
    }
}
