//! Read-only layer/color inspection of a 3MF package.
//!
//! Reports what color structure a package already carries, without
//! building a [`crate::ColorModel`]: Bambu-style height ranges when
//! `Metadata/layer_config_ranges.xml` exists, otherwise a generic scan of
//! `basematerials` display colors in the model document.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{ColorError, ColorResult};

/// Which metadata flavor the inspection found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    /// Bambu Studio height-range metadata.
    Bambu,
    /// Display colors from `basematerials` resources, no height info.
    Generic,
    /// No recognizable color structure.
    Unknown,
}

/// One inspected layer.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectedLayer {
    /// Top of the layer (mm); zero for formats without height info.
    pub z_height: f64,
    /// Hex color, when the metadata carries one.
    pub color: Option<String>,
}

/// Result of inspecting a package.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInspection {
    /// Metadata flavor that produced the layers.
    pub format: PackageFormat,
    /// Layers sorted by ascending height.
    pub layers: Vec<InspectedLayer>,
    /// Height of the topmost layer (mm).
    pub total_height: f64,
    /// True when any layer carries a color.
    pub has_colors: bool,
}

impl LayerInspection {
    fn empty() -> Self {
        Self {
            format: PackageFormat::Unknown,
            layers: Vec::new(),
            total_height: 0.0,
            has_colors: false,
        }
    }
}

/// Inspect the layer/color structure of a 3MF package.
///
/// # Errors
///
/// [`ColorError`] when the package cannot be opened or read. Absent or
/// unparseable metadata yields an empty [`PackageFormat::Unknown`]
/// inspection instead of an error.
pub fn inspect_package<P: AsRef<Path>>(path: P) -> ColorResult<LayerInspection> {
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

    if let Some(xml) = read_entry(&mut archive, "Metadata/layer_config_ranges.xml")? {
        if let Some(inspection) = parse_range_layers(&xml) {
            return Ok(inspection);
        }
    }
    if let Some(xml) = read_entry(&mut archive, "3D/3dmodel.model")? {
        if let Some(inspection) = parse_display_colors(&xml) {
            return Ok(inspection);
        }
    }
    debug!("no recognizable color structure in package");
    Ok(LayerInspection::empty())
}

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

/// Parse Bambu height ranges. Accepts both `min_z`/`max_z` and the
/// `minZ`/`maxZ` spelling Bambu Studio itself writes.
fn parse_range_layers(xml: &str) -> Option<LayerInspection> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut layers: Vec<InspectedLayer> = Vec::new();
    let mut in_range = false;
    let mut pending_max_z: f64 = 0.0;
    let mut pending_color: Option<String> = None;
    let mut capture_color = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"range" => {
                    in_range = true;
                    pending_max_z = range_max_z(e).unwrap_or(0.0);
                    pending_color = None;
                }
                b"filament_colour" if in_range => capture_color = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"range" {
                    if let Some(max_z) = range_max_z(e) {
                        if max_z > 0.0 {
                            layers.push(InspectedLayer {
                                z_height: max_z,
                                color: None,
                            });
                        }
                    }
                }
            }
            Ok(Event::Text(ref t)) if capture_color => {
                pending_color = t.unescape().ok().map(|s| s.trim().to_string());
                capture_color = false;
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"range" => {
                    if pending_max_z > 0.0 {
                        layers.push(InspectedLayer {
                            z_height: pending_max_z,
                            color: pending_color.take(),
                        });
                    }
                    in_range = false;
                }
                b"filament_colour" => capture_color = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    if layers.is_empty() {
        return None;
    }
    layers.sort_by(|a, b| a.z_height.total_cmp(&b.z_height));
    let total_height = layers.last().map_or(0.0, |l| l.z_height);
    let has_colors = layers.iter().any(|l| l.color.is_some());
    Some(LayerInspection {
        format: PackageFormat::Bambu,
        layers,
        total_height,
        has_colors,
    })
}

fn range_max_z(element: &BytesStart<'_>) -> Option<f64> {
    for attr in element.attributes().flatten() {
        let key = attr.key.local_name();
        if key.as_ref() == b"max_z" || key.as_ref() == b"maxZ" {
            return std::str::from_utf8(&attr.value).ok()?.parse().ok();
        }
    }
    None
}

/// Scan `basematerials` resources for display colors. No height info is
/// available from materials alone, so heights stay at zero.
fn parse_display_colors(xml: &str) -> Option<LayerInspection> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut layers: Vec<InspectedLayer> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"base" {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"displaycolor" {
                            if let Ok(color) = std::str::from_utf8(&attr.value) {
                                layers.push(InspectedLayer {
                                    z_height: 0.0,
                                    color: Some(color.to_string()),
                                });
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    if layers.is_empty() {
        return None;
    }
    Some(LayerInspection {
        format: PackageFormat::Generic,
        layers,
        total_height: 0.0,
        has_colors: true,
    })
}
