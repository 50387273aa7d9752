//! Color-metadata extraction from relief packages.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{ColorError, ColorResult};
use crate::model::{ColorLayer, ColorModel, Extraction};

/// Per-layer gcode metadata written by relief generators.
const GCODE_LAYERS_PATH: &str = "Metadata/custom_gcode_per_layer.xml";

/// Slicer project settings (JSON, despite the extension).
const PROJECT_SETTINGS_PATH: &str = "Metadata/project_settings.config";

/// Extract the color model from a relief 3MF package.
///
/// Reads filament-swap layers from `custom_gcode_per_layer.xml` (entries
/// with `type="2"`) and slot colors from `project_settings.config`. A
/// package without the gcode metadata yields [`Extraction::NotPresent`];
/// metadata that exists but cannot be parsed yields
/// [`Extraction::Malformed`]. A missing or unreadable settings file only
/// costs the slot colors, not the extraction.
///
/// # Errors
///
/// [`ColorError`] when the package itself cannot be opened or read.
pub fn extract_color_model<P: AsRef<Path>>(path: P) -> ColorResult<Extraction> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ColorError::PackageNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ColorError::Io(e)
        }
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| {
        ColorError::InvalidArchive {
            message: e.to_string(),
        }
    })?;

    let gcode_xml = match read_entry(&mut archive, GCODE_LAYERS_PATH)? {
        Some(content) => content,
        None => {
            info!("package carries no per-layer gcode metadata");
            return Ok(Extraction::NotPresent);
        }
    };

    let layers = match parse_gcode_layers(&gcode_xml) {
        Ok(layers) => layers,
        Err(details) => return Ok(Extraction::Malformed { details }),
    };
    if layers.is_empty() {
        info!("per-layer gcode metadata carries no color swaps");
        return Ok(Extraction::NotPresent);
    }

    let filament_colors = match read_entry(&mut archive, PROJECT_SETTINGS_PATH)? {
        Some(json) => parse_filament_colors(&json),
        None => {
            warn!("no project settings in package, slot colors unavailable");
            Vec::new()
        }
    };

    info!(
        swaps = layers.len(),
        filaments = filament_colors.len(),
        "extracted color metadata"
    );
    Ok(Extraction::Found(ColorModel::new(layers, filament_colors)))
}

/// Read a named archive entry, `None` when absent.
fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> ColorResult<Option<String>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ColorError::InvalidArchive {
            message: e.to_string(),
        }),
    }
}

/// Parse `<layer type="2" top_z=".." extruder=".." color=".."/>` entries.
/// Returns a human-readable description on malformed content.
fn parse_gcode_layers(xml: &str) -> Result<Vec<ColorLayer>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut layers = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"layer" {
                    if let Some(layer) = parse_layer_element(e)? {
                        layers.push(layer);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(layers)
}

/// Parse one `layer` element; non-swap entries (`type` other than 2) are
/// skipped, as are swap entries missing any of the three attributes.
fn parse_layer_element(element: &BytesStart<'_>) -> Result<Option<ColorLayer>, String> {
    let mut is_swap = false;
    let mut top_z: Option<f64> = None;
    let mut extruder: Option<u32> = None;
    let mut color: Option<String> = None;

    for attr in element.attributes().flatten() {
        let key = attr.key.local_name();
        let value = std::str::from_utf8(&attr.value)
            .map_err(|e| format!("invalid UTF-8 in layer attribute: {e}"))?;

        match key.as_ref() {
            b"type" => is_swap = value == "2",
            b"top_z" => {
                top_z = Some(
                    value
                        .parse()
                        .map_err(|e| format!("invalid top_z {value:?}: {e}"))?,
                );
            }
            b"extruder" => {
                extruder = Some(
                    value
                        .parse()
                        .map_err(|e| format!("invalid extruder {value:?}: {e}"))?,
                );
            }
            b"color" => color = Some(value.to_string()),
            _ => {}
        }
    }

    if !is_swap {
        return Ok(None);
    }
    match (top_z, extruder, color) {
        (Some(top_z), Some(extruder), Some(color)) => Ok(Some(ColorLayer {
            top_z,
            extruder,
            color,
        })),
        _ => Ok(None),
    }
}

/// Pull `filament_colour` out of the project settings JSON. Any problem
/// is downgraded to an empty list with a warning.
fn parse_filament_colors(json: &str) -> Vec<String> {
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "project settings are not valid JSON, slot colors unavailable");
            return Vec::new();
        }
    };
    value
        .get("filament_colour")
        .and_then(|v| v.as_array())
        .map(|colors| {
            colors
                .iter()
                .filter_map(|c| c.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}
