//! Pipeline run configuration.

use std::path::PathBuf;

use relief_align::AlignParams;
use relief_colors::ColorSource;
use relief_compose::ComposeParams;

/// Shape of the output package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// A minimal standards-conforming 3MF.
    #[default]
    Standard,
    /// A Bambu Studio project produced through the slicer CLI and
    /// rebuilt for color preview.
    Bambu,
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// The relief package laid on top.
    pub overlay_path: PathBuf,
    /// The base model package.
    pub base_path: PathBuf,
    /// Where the combined package is written.
    pub output_path: PathBuf,
    /// Output package shape.
    pub output_format: OutputFormat,
    /// Where color metadata comes from.
    pub color_source: ColorSource,
    /// Alignment parameters (rotation, scaling, shifts, embed overlap).
    pub align: AlignParams,
    /// Composition parameters (gap filling).
    pub compose: ComposeParams,
    /// Run the injected repair hook over both input solids.
    pub repair_inputs: bool,
}
