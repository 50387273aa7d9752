//! The height-range descriptor, `Metadata/layer_config_ranges.xml`.
//!
//! Bambu Studio applies extruder assignments per Z-height range through
//! this document. Range bounds are written with full 17-significant-digit
//! precision so the slicer sees exactly the heights the synthesis
//! computed.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use relief_ranges::{format_height, HeightRange};
use tracing::info;

use crate::error::{PackError, PackResult};

fn xml_err(what: &str, e: impl std::fmt::Display) -> PackError {
    PackError::invalid_content(format!("failed to write {what}: {e}"))
}

/// Write the height-range descriptor into an unpacked package.
///
/// # Errors
///
/// Returns an error when the document cannot be built or written.
pub fn write_ranges_descriptor(
    root: &Path,
    object_id: u32,
    ranges: &[HeightRange],
) -> PackResult<()> {
    let xml = build_ranges_document(object_id, ranges)?;

    let metadata_dir = root.join("Metadata");
    fs::create_dir_all(&metadata_dir)?;
    fs::write(metadata_dir.join("layer_config_ranges.xml"), xml)?;

    info!(object_id, ranges = ranges.len(), "wrote height-range descriptor");
    Ok(())
}

fn build_ranges_document(object_id: u32, ranges: &[HeightRange]) -> PackResult<String> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| xml_err("XML declaration", e))?;
    writer
        .write_event(Event::Start(BytesStart::new("objects")))
        .map_err(|e| xml_err("objects element", e))?;

    let mut object = BytesStart::new("object");
    object.push_attribute(("id", object_id.to_string().as_str()));
    writer
        .write_event(Event::Start(object))
        .map_err(|e| xml_err("object element", e))?;

    for range in ranges {
        let mut elem = BytesStart::new("range");
        elem.push_attribute(("min_z", format_height(range.min_z).as_str()));
        elem.push_attribute(("max_z", format_height(range.max_z).as_str()));
        writer
            .write_event(Event::Start(elem))
            .map_err(|e| xml_err("range element", e))?;

        write_option(&mut writer, "extruder", &range.extruder.to_string())?;
        write_option(&mut writer, "layer_height", &range.layer_height.to_string())?;

        writer
            .write_event(Event::End(BytesEnd::new("range")))
            .map_err(|e| xml_err("range end", e))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("object")))
        .map_err(|e| xml_err("object end", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("objects")))
        .map_err(|e| xml_err("objects end", e))?;

    Ok(String::from_utf8(buffer)?)
}

fn write_option<W: std::io::Write>(
    writer: &mut Writer<W>,
    key: &str,
    value: &str,
) -> PackResult<()> {
    let mut option = BytesStart::new("option");
    option.push_attribute(("opt_key", key));
    writer
        .write_event(Event::Start(option))
        .map_err(|e| xml_err("option element", e))?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(|e| xml_err("option text", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("option")))
        .map_err(|e| xml_err("option end", e))?;
    Ok(())
}
