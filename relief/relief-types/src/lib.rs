//! Core geometric types for the ReliefForge composition pipeline.
//!
//! This crate provides the two types every other pipeline stage speaks:
//!
//! - [`Solid`] - an indexed triangle mesh, owned by exactly one stage at a time
//! - [`Aabb`] - axis-aligned bounding box
//!
//! # Units
//!
//! All coordinates are `f64` millimeters. Z is "up" (build direction);
//! overlays sit on top of bases along +Z.
//!
//! # Ownership
//!
//! A `Solid` flows through the pipeline by value. Stages that derive new
//! geometry (alignment, clipping, union) return fresh solids rather than
//! mutating shared state, so concurrent pipeline runs never alias.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]

mod bounds;
mod solid;

pub use bounds::Aabb;
pub use solid::{rectangular_slab, Solid};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
