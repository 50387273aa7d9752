//! Indexed triangle solid.

use nalgebra::{Point3, Vector3};

use crate::Aabb;

/// A triangulated solid: vertex positions plus indexed triangular faces.
///
/// Faces use counter-clockwise winding when viewed from outside, so normals
/// point outward by the right-hand rule. Whether the surface is actually
/// closed (watertight) is a property of the input, not of this type; the
/// boolean engine is the arbiter of volume validity.
///
/// # Example
///
/// ```
/// use relief_types::{Point3, Solid};
///
/// let mut solid = Solid::new();
/// solid.vertices.push(Point3::new(0.0, 0.0, 0.0));
/// solid.vertices.push(Point3::new(1.0, 0.0, 0.0));
/// solid.vertices.push(Point3::new(0.5, 1.0, 0.0));
/// solid.faces.push([0, 1, 2]);
/// assert_eq!(solid.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solid {
    /// Vertex positions in millimeters.
    pub vertices: Vec<Point3<f64>>,
    /// Triangles as `[v0, v1, v2]` indices into `vertices`.
    pub faces: Vec<[u32; 3]>,
}

impl Solid {
    /// Create an empty solid.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a solid from existing vertex and face buffers.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangular faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether the solid carries no renderable geometry.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Axis-aligned bounds of all vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter())
    }

    /// Translate every vertex by `offset`.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for v in &mut self.vertices {
            *v += offset;
        }
    }

    /// Scale X and Y about the origin, leaving Z untouched.
    ///
    /// Relief overlays are scaled only in the plane: their layer heights
    /// carry color-swap information and must never be stretched.
    pub fn scale_xy(&mut self, factor: f64) {
        for v in &mut self.vertices {
            v.x *= factor;
            v.y *= factor;
        }
    }

    /// Rotate about the vertical (Z) axis through the origin.
    ///
    /// # Arguments
    ///
    /// * `angle` - rotation angle in radians, counter-clockwise seen from +Z
    pub fn rotate_z(&mut self, angle: f64) {
        let (sin_a, cos_a) = angle.sin_cos();
        for v in &mut self.vertices {
            let (x, y) = (v.x, v.y);
            v.x = x.mul_add(cos_a, -(y * sin_a));
            v.y = x.mul_add(sin_a, y * cos_a);
        }
    }

    /// Translate so the XY bounding-box center sits on the origin and the
    /// lowest vertex sits at Z = 0.
    ///
    /// Slicer front ends expect build-plate-ready geometry in this frame.
    /// No-op for an empty solid.
    pub fn center_on_origin(&mut self) {
        let bounds = self.bounds();
        if bounds.is_empty() {
            return;
        }
        let center = bounds.center();
        self.translate(Vector3::new(-center.x, -center.y, -bounds.bottom_z()));
    }

    /// Append another solid's geometry, offsetting its face indices.
    pub fn merge(&mut self, other: &Self) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|&[a, b, c]| [a + offset, b + offset, c + offset]),
        );
    }

}

/// Build an axis-aligned rectangular slab.
///
/// Spans `[origin, origin + size]` with outward-facing normals. Handy as a
/// base fixture in tests and as the footprint primitive in gap filling.
#[must_use]
pub fn rectangular_slab(origin: Point3<f64>, size: Vector3<f64>) -> Solid {
    let (x0, y0, z0) = (origin.x, origin.y, origin.z);
    let (x1, y1, z1) = (x0 + size.x, y0 + size.y, z0 + size.z);

    let vertices = vec![
        Point3::new(x0, y0, z0),
        Point3::new(x1, y0, z0),
        Point3::new(x1, y1, z0),
        Point3::new(x0, y1, z0),
        Point3::new(x0, y0, z1),
        Point3::new(x1, y0, z1),
        Point3::new(x1, y1, z1),
        Point3::new(x0, y1, z1),
    ];

    // Two CCW triangles per face, normals outward.
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2], // bottom (-Z)
        [4, 5, 6],
        [4, 6, 7], // top (+Z)
        [0, 1, 5],
        [0, 5, 4], // front (-Y)
        [3, 7, 6],
        [3, 6, 2], // back (+Y)
        [0, 4, 7],
        [0, 7, 3], // left (-X)
        [1, 2, 6],
        [1, 6, 5], // right (+X)
    ];

    Solid::from_parts(vertices, faces)
}
