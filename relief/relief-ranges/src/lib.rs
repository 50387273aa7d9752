//! Height-range synthesis.
//!
//! A color model carries swap heights in the source package's own
//! coordinates; after the relief is embedded on a base at `z_offset`,
//! those heights move up by exactly that offset. This crate turns the
//! model into the contiguous extruder height ranges that Bambu Studio's
//! `layer_config_ranges.xml` expects:
//!
//! - the first range starts at `z_offset`, where the relief begins, not
//!   at the plate
//! - each range ends at its own swap height
//! - the last range is extended far past the model top so the final
//!   color runs out the print
//!
//! Slot 1 never gets a range; it is the printer's implicit starting
//! filament.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

use relief_colors::ColorModel;
use thiserror::Error;
use tracing::{info, warn};

/// Extension added to the last range so the final color covers the
/// remainder of the print (mm).
pub const TAIL_SENTINEL_MM: f64 = 1000.0;

/// Layer height written into every range for slicer preview purposes (mm).
pub const PREVIEW_LAYER_HEIGHT_MM: f64 = 0.08;

/// Tolerance when checking range contiguity (mm).
const CONTIGUITY_EPSILON: f64 = 1e-9;

/// Result type for range validation.
pub type RangeResult<T> = Result<T, RangeError>;

/// Violations of the height-range sequence rules.
#[derive(Debug, Error)]
pub enum RangeError {
    /// A range ends at or below where it starts.
    #[error("range {index} is inverted: min {min_z} >= max {max_z}")]
    Inverted {
        /// Index of the offending range.
        index: usize,
        /// Range start (mm).
        min_z: f64,
        /// Range end (mm).
        max_z: f64,
    },

    /// Consecutive ranges leave a gap or overlap.
    #[error("range {index} starts at {min_z} but the previous range ends at {previous_max_z}")]
    NotContiguous {
        /// Index of the offending range.
        index: usize,
        /// Its start (mm).
        min_z: f64,
        /// End of the range before it (mm).
        previous_max_z: f64,
    },

    /// A range claims a reserved or out-of-order extruder slot.
    #[error("range {index} uses extruder {extruder}, expected {expected}")]
    BadExtruder {
        /// Index of the offending range.
        index: usize,
        /// Slot it claims.
        extruder: u32,
        /// Slot the sequence requires.
        expected: u32,
    },
}

/// One extruder height range.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightRange {
    /// Bottom of the range in final-model coordinates (mm).
    pub min_z: f64,
    /// Top of the range in final-model coordinates (mm).
    pub max_z: f64,
    /// Extruder slot printing this range (2 and up).
    pub extruder: u32,
    /// Preview layer height (mm).
    pub layer_height: f64,
}

/// Synthesize extruder height ranges from a color model.
///
/// `z_offset` is where the relief sits in the combined model; every swap
/// height is shifted up by it. Returns an empty vector for an empty
/// model.
#[must_use]
pub fn synthesize(model: &ColorModel, z_offset: f64) -> Vec<HeightRange> {
    let count = model.layers.len();
    let mut ranges = Vec::with_capacity(count);

    for (i, layer) in model.layers.iter().enumerate() {
        let min_z = if i == 0 {
            z_offset
        } else {
            model.layers[i - 1].top_z + z_offset
        };
        let mut max_z = layer.top_z + z_offset;
        if i + 1 == count {
            max_z += TAIL_SENTINEL_MM;
        }
        ranges.push(HeightRange {
            min_z,
            max_z,
            extruder: layer.extruder,
            layer_height: PREVIEW_LAYER_HEIGHT_MM,
        });
    }

    info!(ranges = ranges.len(), z_offset, "synthesized height ranges");
    ranges
}

/// Validate that ranges form a contiguous ascending sequence on extruder
/// slots 2, 3, 4, ...
///
/// # Errors
///
/// The first [`RangeError`] found, if any.
pub fn validate_sequence(ranges: &[HeightRange]) -> RangeResult<()> {
    let mut previous_max_z: Option<f64> = None;
    for (index, range) in ranges.iter().enumerate() {
        if range.max_z <= range.min_z {
            return Err(RangeError::Inverted {
                index,
                min_z: range.min_z,
                max_z: range.max_z,
            });
        }
        if let Some(previous) = previous_max_z {
            if (range.min_z - previous).abs() > CONTIGUITY_EPSILON {
                return Err(RangeError::NotContiguous {
                    index,
                    min_z: range.min_z,
                    previous_max_z: previous,
                });
            }
        }
        let expected = 2 + index as u32;
        if range.extruder != expected {
            return Err(RangeError::BadExtruder {
                index,
                extruder: range.extruder,
                expected,
            });
        }
        previous_max_z = Some(range.max_z);
    }
    Ok(())
}

/// Warn about swap heights that fall outside the combined model.
///
/// Heights are checked after the `z_offset` shift. This never fails the
/// run; an out-of-range swap still slices, it just never fires.
pub fn validate_layer_heights(model: &ColorModel, z_offset: f64, model_top_z: f64) -> bool {
    let mut all_valid = true;
    for (i, layer) in model.layers.iter().enumerate() {
        let z = layer.top_z + z_offset;
        if z < 0.0 {
            warn!(layer = i + 1, z_mm = format!("{z:.3}"), "swap height is negative");
            all_valid = false;
        }
        if z > model_top_z {
            warn!(
                layer = i + 1,
                z_mm = format!("{z:.3}"),
                top_mm = format!("{model_top_z:.3}"),
                "swap height is above the model top"
            );
            all_valid = false;
        }
    }
    all_valid
}

/// Format a height with 17 significant digits, printf `%.17g` style:
/// enough digits to survive an f64 round trip, trailing zeros stripped.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_height(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    if (-4..17).contains(&exponent) {
        let decimals = (16 - exponent).max(0) as usize;
        let mut s = format!("{value:.decimals$}");
        if s.contains('.') {
            while s.ends_with('0') {
                s.pop();
            }
            if s.ends_with('.') {
                s.pop();
            }
        }
        s
    } else {
        format!("{value:e}")
    }
}
