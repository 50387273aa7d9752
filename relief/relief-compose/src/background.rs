//! Background-height detection at the overlay perimeter.
//!
//! A relief overlay's rim sits at the height of its background layer; gap
//! fill must rise exactly to that height. Three detection methods, tried
//! in order:
//!
//! 1. boundary edges (edges referenced by exactly one face)
//! 2. vertices near the 2D convex hull boundary
//! 3. vertices in the top 10% of the Z range
//!
//! Falling through a method is logged and never fatal.

use std::collections::HashMap;

use geo::{ConvexHull, EuclideanDistance, MultiPoint, Point};
use relief_types::Solid;
use tracing::{debug, warn};

/// Max number of perimeter samples before downsampling.
const MAX_SAMPLES: usize = 40;

/// Distance from the hull boundary (mm) that still counts as "on" it.
const HULL_TOLERANCE_MM: f64 = 0.5;

/// Detect the overlay's background height from its perimeter.
///
/// Returns the mode of the sampled perimeter Z values (histogram-binned),
/// or the solid's top Z when no perimeter can be found at all.
#[must_use]
pub fn sample_background_height(solid: &Solid) -> f64 {
    let mut samples = boundary_edge_heights(solid);
    if samples.is_empty() {
        debug!("no boundary edges; falling back to 2D hull proximity");
        samples = hull_proximity_heights(solid);
    }
    if samples.is_empty() {
        warn!("no perimeter vertices found; sampling the top height band");
        samples = top_band_heights(solid);
    }
    if samples.is_empty() {
        warn!("no perimeter samples at all; using the solid's top Z");
        return solid.bounds().top_z();
    }

    downsample(&mut samples);
    let height = histogram_mode(&samples);
    debug!(
        samples = samples.len(),
        background_mm = format!("{height:.3}"),
        "detected background height"
    );
    height
}

/// Z values of vertices on boundary edges (edges with exactly one face).
fn boundary_edge_heights(solid: &Solid) -> Vec<f64> {
    let mut edge_count: HashMap<(u32, u32), u32> = HashMap::new();
    for &[a, b, c] in &solid.faces {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            let key = (u.min(v), u.max(v));
            *edge_count.entry(key).or_insert(0) += 1;
        }
    }

    let mut on_boundary = vec![false; solid.vertices.len()];
    for (&(u, v), &count) in &edge_count {
        if count == 1 {
            on_boundary[u as usize] = true;
            on_boundary[v as usize] = true;
        }
    }

    solid
        .vertices
        .iter()
        .zip(&on_boundary)
        .filter_map(|(p, &boundary)| boundary.then_some(p.z))
        .collect()
}

/// Z values of vertices within [`HULL_TOLERANCE_MM`] of the footprint hull.
fn hull_proximity_heights(solid: &Solid) -> Vec<f64> {
    if solid.vertices.is_empty() {
        return Vec::new();
    }
    let points: MultiPoint<f64> = solid
        .vertices
        .iter()
        .map(|v| Point::new(v.x, v.y))
        .collect();
    let boundary = points.convex_hull().exterior().clone();

    solid
        .vertices
        .iter()
        .filter(|v| Point::new(v.x, v.y).euclidean_distance(&boundary) < HULL_TOLERANCE_MM)
        .map(|v| v.z)
        .collect()
}

/// Z values of vertices in the top 10% of the solid's height range.
fn top_band_heights(solid: &Solid) -> Vec<f64> {
    let bounds = solid.bounds();
    if bounds.is_empty() {
        return Vec::new();
    }
    let threshold = bounds.top_z() - 0.1 * bounds.height();
    solid
        .vertices
        .iter()
        .filter(|v| v.z > threshold)
        .map(|v| v.z)
        .collect()
}

/// Thin to at most [`MAX_SAMPLES`] evenly spaced values.
fn downsample(samples: &mut Vec<f64>) {
    if samples.len() <= MAX_SAMPLES {
        return;
    }
    let step = (samples.len() - 1) as f64 / (MAX_SAMPLES - 1) as f64;
    let picked: Vec<f64> = (0..MAX_SAMPLES)
        .map(|i| samples[(i as f64 * step).round() as usize])
        .collect();
    *samples = picked;
}

/// Center of the most populated histogram bin.
fn histogram_mode(samples: &[f64]) -> f64 {
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max - min < f64::EPSILON {
        return min;
    }

    let bins = (samples.len() / 2).clamp(1, 10);
    let width = (max - min) / bins as f64;
    let mut counts = vec![0_usize; bins];
    for &z in samples {
        let idx = (((z - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let mode_bin = counts
        .iter()
        .enumerate()
        .max_by_key(|(_, &c)| c)
        .map_or(0, |(i, _)| i);

    (mode_bin as f64).mul_add(width, min) + width / 2.0
}
