//! The extracted color model.

/// A single filament swap: everything below `top_z` (down to the previous
/// swap) prints with `extruder`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLayer {
    /// Height of the swap in the source package's own coordinates (mm).
    pub top_z: f64,
    /// Extruder/filament slot. Slot 1 is the implicit starting filament,
    /// so swaps use slots 2 and up.
    pub extruder: u32,
    /// Hex color of the filament printed *below* this height.
    pub color: String,
}

/// The full color model of a relief package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorModel {
    /// Swap layers, sorted by ascending `top_z`.
    pub layers: Vec<ColorLayer>,
    /// Filament colors by slot order, slot 1 first.
    pub filament_colors: Vec<String>,
}

impl ColorModel {
    /// Build a model, sorting layers by swap height.
    #[must_use]
    pub fn new(mut layers: Vec<ColorLayer>, filament_colors: Vec<String>) -> Self {
        layers.sort_by(|a, b| a.top_z.total_cmp(&b.top_z));
        Self {
            layers,
            filament_colors,
        }
    }

    /// True when the model carries no swaps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Highest extruder slot referenced by any swap.
    #[must_use]
    pub fn max_extruder(&self) -> u32 {
        self.layers.iter().map(|l| l.extruder).max().unwrap_or(1)
    }
}

/// Where the pipeline gets its color model from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ColorSource {
    /// Read the color metadata out of the source relief package.
    #[default]
    Preserve,
    /// Parse user-supplied swap-instruction text.
    InjectText(String),
    /// Skip color handling entirely.
    Disabled,
}

/// Outcome of a color-metadata extraction attempt.
///
/// Absent metadata and broken metadata are different conditions: the
/// first downgrades the run to colorless output, the second deserves a
/// louder report.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Usable color metadata was found.
    Found(ColorModel),
    /// The package carries no color metadata at all.
    NotPresent,
    /// Color metadata exists but could not be parsed.
    Malformed {
        /// What was wrong with it.
        details: String,
    },
}

impl Extraction {
    /// The model, if extraction found one.
    #[must_use]
    pub fn into_model(self) -> Option<ColorModel> {
        match self {
            Self::Found(model) => Some(model),
            Self::NotPresent | Self::Malformed { .. } => None,
        }
    }
}
