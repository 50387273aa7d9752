//! Axis-aligned bounding box.

use nalgebra::{Point3, Vector3};

/// An axis-aligned bounding box.
///
/// # Example
///
/// ```
/// use relief_types::{Aabb, Point3};
///
/// let aabb = Aabb::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(100.0, 100.0, 10.0),
/// );
/// assert_eq!(aabb.width(), 100.0);
/// assert_eq!(aabb.top_z(), 10.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner (smallest x, y, z).
    pub min: Point3<f64>,
    /// Maximum corner (largest x, y, z).
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a bounding box from two corners, correcting any swapped axes.
    #[must_use]
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self {
            min: Point3::new(min.x.min(max.x), min.y.min(max.y), min.z.min(max.z)),
            max: Point3::new(min.x.max(max.x), min.y.max(max.y), min.z.max(max.z)),
        }
    }

    /// Create an empty (inverted) box, suitable as a fold seed.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Build the box enclosing an iterator of points.
    ///
    /// Returns an empty box for an empty iterator.
    #[must_use]
    pub fn from_points<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.expand_to_include(p);
        }
        aabb
    }

    /// Whether the box encloses no volume (min > max on any axis).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to include `point`.
    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// Extent along X.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Extent along Y.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Extent along Z.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.z - self.min.z
    }

    /// The highest Z coordinate (the "top" a stacked solid rests on).
    #[inline]
    #[must_use]
    pub fn top_z(&self) -> f64 {
        self.max.z
    }

    /// The lowest Z coordinate.
    #[inline]
    #[must_use]
    pub fn bottom_z(&self) -> f64 {
        self.min.z
    }

    /// Geometric center of the box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        self.min + (self.max - self.min) * 0.5
    }

    /// Size along all three axes.
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}
