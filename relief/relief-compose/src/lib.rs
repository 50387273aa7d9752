//! Boolean composition of an aligned overlay onto a base solid.
//!
//! Given the aligned pair from `relief-align`, this crate:
//!
//! 1. builds a clipping prism from the convex hull of the base footprint
//! 2. clips the overlay against it (intersection)
//! 3. optionally synthesizes gap-fill geometry where a scaled-down overlay
//!    leaves the base's top surface exposed
//! 4. requests the union of base + clipped overlay (+ fill) from an
//!    injected [`BooleanEngine`]
//!
//! The crate performs only 2D polygon work (convex hulls, boolean
//! difference, extrusion) itself; all 3D CSG is delegated to the engine.
//! An empty clip result and a failed union are fatal; gap filling that
//! finds no gap is a logged no-op.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

mod background;
mod compose;
mod engine;
mod error;
mod fill;
mod footprint;

pub use background::sample_background_height;
pub use compose::{compose, ComposeParams, Composition};
pub use engine::{BooleanEngine, EngineError, EngineResult};
pub use error::{ComposeError, ComposeResult};
pub use fill::build_fill_geometry;
pub use footprint::{extrude_polygon, footprint_hull};
