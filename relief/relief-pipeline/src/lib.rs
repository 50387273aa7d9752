//! End-to-end relief composition.
//!
//! A run takes a relief ("HueForge"-style) package and a base model,
//! aligns and embeds the relief on the base's top face, booleans the
//! parts into one solid, carries the relief's filament-swap heights into
//! the combined object's coordinates, and writes either a plain 3MF or a
//! rebuilt Bambu Studio project.
//!
//! External tools enter as capabilities: the 3D boolean engine
//! ([`relief_compose::BooleanEngine`]) is mandatory, the slicer CLI
//! ([`SlicerExport`] / [`BambuStudioCli`]) is needed for Bambu output,
//! and mesh repair ([`SolidRepair`]) is optional and off by default.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod export;
mod pipeline;
mod repair;

pub use config::{OutputFormat, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use export::{BambuStudioCli, ExportError, ExportResult, SlicerExport};
pub use pipeline::{Pipeline, PipelineReport};
pub use repair::SolidRepair;
