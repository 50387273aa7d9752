//! Swap-instruction text parsing.
//!
//! Relief generators print a manual-swap recipe like:
//!
//! ```text
//! Filaments Used:
//! PLA BambuLab Basic Black
//! PLA BambuLab Basic Cobalt Blue
//!
//! Swap Instructions:
//! Start with Black
//! At layer #8 (0.72mm) swap to Cobalt Blue
//! ```
//!
//! This module turns that text into a [`ColorModel`]. The starting color
//! gets no layer entry (slot 1 is implicit); each swap line claims the
//! next slot, starting at 2.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::model::{ColorLayer, ColorModel, Extraction};
use crate::palette::color_name_to_hex;

#[allow(clippy::unwrap_used)] // pattern is a literal
fn filaments_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Filaments?\s+Used:").unwrap())
}

#[allow(clippy::unwrap_used)]
fn swaps_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Swap\s+Instructions?:").unwrap())
}

#[allow(clippy::unwrap_used)]
fn filament_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(PLA|ABS|PETG|TPU|Bambu|Prusa|Hatchbox)").unwrap())
}

#[allow(clippy::unwrap_used)]
fn start_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Start\s+with\s+(.+)").unwrap())
}

#[allow(clippy::unwrap_used)]
fn swap_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^At\s+layer\s+#(\d+)\s+\(([0-9.]+)mm\)\s+swap\s+to\s+(.+)").unwrap()
    })
}

/// Parse swap-instruction text into a color model.
///
/// Returns [`Extraction::NotPresent`] for text with no swap lines and
/// [`Extraction::Malformed`] when a swap line carries an unreadable
/// height. When the filament list is missing, slot colors are derived
/// from the swap lines themselves.
#[must_use]
pub fn parse_swap_instructions(text: &str) -> Extraction {
    let mut in_filaments = false;
    let mut in_swaps = false;

    let mut filament_colors: Vec<String> = Vec::new();
    let mut layers: Vec<ColorLayer> = Vec::new();
    // Slot 1 is the starting filament; the first swap takes slot 2.
    let mut next_extruder: u32 = 2;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if filaments_header().is_match(line) {
            in_filaments = true;
            in_swaps = false;
            continue;
        }
        if swaps_header().is_match(line) {
            in_filaments = false;
            in_swaps = true;
            continue;
        }

        if in_filaments && filament_line().is_match(line) {
            filament_colors.push(color_name_to_hex(line));
        }

        if in_swaps {
            if start_line().is_match(line) {
                // No layer entry for the starting color.
                next_extruder = 2;
                continue;
            }
            if let Some(caps) = swap_line().captures(line) {
                let Ok(top_z) = caps[2].parse::<f64>() else {
                    return Extraction::Malformed {
                        details: format!("unreadable swap height in line: {line}"),
                    };
                };
                layers.push(ColorLayer {
                    top_z,
                    extruder: next_extruder,
                    color: color_name_to_hex(caps[3].trim()),
                });
                next_extruder += 1;
            }
        }
    }

    if layers.is_empty() {
        return Extraction::NotPresent;
    }
    if filament_colors.is_empty() {
        warn!("no filament list found, deriving slot colors from swap lines");
        filament_colors = layers.iter().map(|l| l.color.clone()).collect();
    }
    info!(
        swaps = layers.len(),
        filaments = filament_colors.len(),
        "parsed swap instructions"
    );
    Extraction::Found(ColorModel::new(layers, filament_colors))
}
