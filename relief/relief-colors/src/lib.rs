//! Color-layer extraction for relief packages.
//!
//! Relief ("HueForge"-style) packages carry the height at which each
//! filament swap happens. This crate recovers that color model from two
//! sources:
//!
//! - **Preserve**: read `Metadata/custom_gcode_per_layer.xml` and
//!   `Metadata/project_settings.config` out of the source package
//! - **Inject**: parse the swap-instruction text that relief generators
//!   print for manual printers ("Start with Black / At layer #8 (0.72mm)
//!   swap to Cobalt Blue")
//!
//! A package without color metadata and a package with *broken* color
//! metadata are different situations, so extraction returns a three-way
//! [`Extraction`] instead of an `Option`.
//!
//! The crate also ships a read-only package inspector ([`inspect`]) that
//! reports the layer/color structure already present in a 3MF.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod error;
mod extract;
mod inspect;
mod model;
mod palette;
mod text;

pub use error::{ColorError, ColorResult};
pub use extract::extract_color_model;
pub use inspect::{inspect_package, InspectedLayer, LayerInspection, PackageFormat};
pub use model::{ColorLayer, ColorModel, ColorSource, Extraction};
pub use palette::color_name_to_hex;
pub use text::parse_swap_instructions;
