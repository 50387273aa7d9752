//! Assembly configuration, `Metadata/model_settings.config`.
//!
//! The slicer CLI writes this document with an empty `<assemble>`
//! section, which Bambu Studio rejects ("assemble objects, size 0"), so
//! the rebuild regenerates it unconditionally: one object on one plate,
//! assembled with the transform taken from the build item of the
//! geometry document.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info, warn};

use crate::error::{PackError, PackResult};

/// Object id the regenerated configuration assigns. The slicer CLI
/// numbers the printable object 2 (1 is its internal volume).
const ASSEMBLY_OBJECT_ID: &str = "2";

/// Build transform centering the object on a 256x256 mm plate.
const DEFAULT_TRANSFORM: &str = "1 0 0 0 1 0 0 0 1 128 128 0";

/// Object name written into the configuration metadata.
const OBJECT_NAME: &str = "ReliefForge";

/// Detect the mesh object id of an unpacked package.
///
/// Prefers `3D/Objects/object_N.model` file names; falls back to the
/// first `object` id in the geometry document, then to 1. Packages with
/// several object files keep the first id, with a warning.
#[must_use]
pub fn detect_object_id(root: &Path) -> u32 {
    let mut ids = object_file_ids(root);
    if !ids.is_empty() {
        ids.sort_unstable();
        if ids.len() > 1 {
            warn!(?ids, "multiple mesh objects in package, using the first");
        }
        return ids[0];
    }

    let model_path = root.join("3D").join("3dmodel.model");
    if let Ok(xml) = fs::read_to_string(&model_path) {
        if let Some(id) = first_object_id(&xml) {
            return id;
        }
    }

    warn!("could not detect mesh object id, assuming 1");
    1
}

/// Ids parsed from `3D/Objects/object_N.model` file names.
pub(crate) fn object_file_ids(root: &Path) -> Vec<u32> {
    let objects_dir = root.join("3D").join("Objects");
    let Ok(entries) = fs::read_dir(&objects_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix("object_")?
                .strip_suffix(".model")?
                .parse()
                .ok()
        })
        .collect()
}

fn first_object_id(xml: &str) -> Option<u32> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"object" {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"id" {
                            return std::str::from_utf8(&attr.value).ok()?.parse().ok();
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Regenerate `Metadata/model_settings.config` in an unpacked package.
///
/// The assemble transform comes from the build item in the geometry
/// document, or a centered default when the package has none; the face
/// count comes from the object mesh document when present.
///
/// # Errors
///
/// Returns an error when the document cannot be built or written.
pub fn write_assembly_config(root: &Path) -> PackResult<()> {
    let transform = build_item_transform(root);
    let face_count = object_face_count(root);
    let xml = build_assembly_document(&transform, face_count)?;

    let metadata_dir = root.join("Metadata");
    fs::create_dir_all(&metadata_dir)?;
    fs::write(metadata_dir.join("model_settings.config"), xml)?;

    info!(transform, face_count, "regenerated assembly configuration");
    Ok(())
}

/// Write the empty relationship stub the assembly configuration needs,
/// `Metadata/_rels/model_settings.config.rels`. Bambu Studio refuses to
/// load objects for assembly without it.
///
/// # Errors
///
/// Returns an error when the stub cannot be written.
pub fn write_rels_stub(root: &Path) -> PackResult<()> {
    let rels_dir = root.join("Metadata").join("_rels");
    fs::create_dir_all(&rels_dir)?;
    fs::write(rels_dir.join("model_settings.config.rels"), RELS_STUB)?;
    Ok(())
}

/// Empty relationships document.
const RELS_STUB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
</Relationships>
"#;

/// Transform of the first build item in the geometry document.
fn build_item_transform(root: &Path) -> String {
    let model_path = root.join("3D").join("3dmodel.model");
    let Ok(xml) = fs::read_to_string(&model_path) else {
        warn!("no geometry document in package, using default transform");
        return DEFAULT_TRANSFORM.to_string();
    };

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);
    let mut in_build = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"build" => in_build = true,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"build" => in_build = false,
            Ok(Event::Start(ref e) | Event::Empty(ref e))
                if in_build && e.local_name().as_ref() == b"item" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"transform" {
                        if let Ok(value) = std::str::from_utf8(&attr.value) {
                            return value.to_string();
                        }
                    }
                }
                return DEFAULT_TRANSFORM.to_string();
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    debug!("no build item in geometry document, using default transform");
    DEFAULT_TRANSFORM.to_string()
}

/// Triangle count of the first object mesh document, zero when the
/// package keeps its geometry inline.
fn object_face_count(root: &Path) -> usize {
    let mut ids = object_file_ids(root);
    ids.sort_unstable();
    let Some(id) = ids.first() else {
        return 0;
    };
    let path = root.join("3D").join("Objects").join(format!("object_{id}.model"));
    let Ok(xml) = fs::read_to_string(&path) else {
        return 0;
    };

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);
    let mut count = 0;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"triangle" {
                    count += 1;
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    count
}

fn xml_err(what: &str, e: impl std::fmt::Display) -> PackError {
    PackError::invalid_content(format!("failed to write {what}: {e}"))
}

fn write_metadata<W: std::io::Write>(
    writer: &mut Writer<W>,
    key: &str,
    value: &str,
) -> PackResult<()> {
    let mut meta = BytesStart::new("metadata");
    meta.push_attribute(("key", key));
    meta.push_attribute(("value", value));
    writer
        .write_event(Event::Empty(meta))
        .map_err(|e| xml_err("metadata", e))
}

fn build_assembly_document(transform: &str, face_count: usize) -> PackResult<String> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| xml_err("XML declaration", e))?;
    writer
        .write_event(Event::Start(BytesStart::new("config")))
        .map_err(|e| xml_err("config element", e))?;

    // Object section
    let mut object = BytesStart::new("object");
    object.push_attribute(("id", ASSEMBLY_OBJECT_ID));
    writer
        .write_event(Event::Start(object))
        .map_err(|e| xml_err("object element", e))?;
    write_metadata(&mut writer, "name", OBJECT_NAME)?;
    write_metadata(&mut writer, "extruder", "1")?;
    if face_count > 0 {
        let mut meta = BytesStart::new("metadata");
        meta.push_attribute(("face_count", face_count.to_string().as_str()));
        writer
            .write_event(Event::Empty(meta))
            .map_err(|e| xml_err("face_count metadata", e))?;
    }

    let mut part = BytesStart::new("part");
    part.push_attribute(("id", "1"));
    part.push_attribute(("subtype", "normal_part"));
    writer
        .write_event(Event::Start(part))
        .map_err(|e| xml_err("part element", e))?;
    write_metadata(&mut writer, "name", OBJECT_NAME)?;
    write_metadata(&mut writer, "matrix", "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1")?;
    write_metadata(&mut writer, "source_file", "ReliefForge/combined_model.3mf")?;
    write_metadata(&mut writer, "source_object_id", "0")?;
    write_metadata(&mut writer, "source_volume_id", "0")?;
    write_metadata(&mut writer, "source_offset_x", "0")?;
    write_metadata(&mut writer, "source_offset_y", "0")?;
    write_metadata(&mut writer, "source_offset_z", "0")?;
    if face_count > 0 {
        let mut stat = BytesStart::new("mesh_stat");
        stat.push_attribute(("face_count", face_count.to_string().as_str()));
        stat.push_attribute(("edges_fixed", "0"));
        stat.push_attribute(("degenerate_facets", "0"));
        stat.push_attribute(("facets_removed", "0"));
        stat.push_attribute(("facets_reversed", "0"));
        stat.push_attribute(("backwards_edges", "0"));
        writer
            .write_event(Event::Empty(stat))
            .map_err(|e| xml_err("mesh_stat", e))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("part")))
        .map_err(|e| xml_err("part end", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("object")))
        .map_err(|e| xml_err("object end", e))?;

    // Plate section
    writer
        .write_event(Event::Start(BytesStart::new("plate")))
        .map_err(|e| xml_err("plate element", e))?;
    write_metadata(&mut writer, "plater_id", "1")?;
    write_metadata(&mut writer, "plater_name", "")?;
    write_metadata(&mut writer, "locked", "false")?;
    writer
        .write_event(Event::Start(BytesStart::new("model_instance")))
        .map_err(|e| xml_err("model_instance element", e))?;
    write_metadata(&mut writer, "object_id", ASSEMBLY_OBJECT_ID)?;
    write_metadata(&mut writer, "instance_id", "0")?;
    write_metadata(&mut writer, "identify_id", ASSEMBLY_OBJECT_ID)?;
    writer
        .write_event(Event::End(BytesEnd::new("model_instance")))
        .map_err(|e| xml_err("model_instance end", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("plate")))
        .map_err(|e| xml_err("plate end", e))?;

    // Assemble section
    writer
        .write_event(Event::Start(BytesStart::new("assemble")))
        .map_err(|e| xml_err("assemble element", e))?;
    let mut item = BytesStart::new("assemble_item");
    item.push_attribute(("object_id", ASSEMBLY_OBJECT_ID));
    item.push_attribute(("instance_id", "0"));
    item.push_attribute(("transform", transform));
    item.push_attribute(("offset", "0 0 0"));
    writer
        .write_event(Event::Empty(item))
        .map_err(|e| xml_err("assemble_item", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("assemble")))
        .map_err(|e| xml_err("assemble end", e))?;

    writer
        .write_event(Event::End(BytesEnd::new("config")))
        .map_err(|e| xml_err("config end", e))?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const MODEL_WITH_BUILD: &str = r#"<?xml version="1.0"?>
<model xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources><object id="2" type="model"/></resources>
  <build><item objectid="2" transform="1 0 0 0 1 0 0 0 1 128 128 2.5"/></build>
</model>"#;

    const OBJECT_MODEL: &str = r#"<?xml version="1.0"?>
<model xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources><object id="1"><mesh>
    <vertices>
      <vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/>
    </vertices>
    <triangles>
      <triangle v1="0" v2="1" v3="2"/>
      <triangle v1="2" v2="1" v3="0"/>
    </triangles>
  </mesh></object></resources>
</model>"#;

    #[test]
    fn object_id_comes_from_object_file_names() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/Objects/object_3.model", OBJECT_MODEL);
        assert_eq!(detect_object_id(dir.path()), 3);
    }

    #[test]
    fn object_id_falls_back_to_the_geometry_document() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/3dmodel.model", MODEL_WITH_BUILD);
        assert_eq!(detect_object_id(dir.path()), 2);
    }

    #[test]
    fn object_id_defaults_to_one() {
        let dir = TempDir::new().unwrap();
        assert_eq!(detect_object_id(dir.path()), 1);
    }

    #[test]
    fn assembly_carries_the_build_item_transform_and_face_count() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/3dmodel.model", MODEL_WITH_BUILD);
        write_file(dir.path(), "3D/Objects/object_1.model", OBJECT_MODEL);

        write_assembly_config(dir.path()).unwrap();

        let xml = fs::read_to_string(dir.path().join("Metadata/model_settings.config")).unwrap();
        assert!(xml.contains(r#"transform="1 0 0 0 1 0 0 0 1 128 128 2.5""#));
        assert!(xml.contains(r#"<mesh_stat face_count="2""#));
        assert!(xml.contains(r#"<part id="1" subtype="normal_part">"#));
        assert!(xml.contains("<assemble>"));
    }

    #[test]
    fn missing_geometry_uses_the_centered_default() {
        let dir = TempDir::new().unwrap();
        write_assembly_config(dir.path()).unwrap();

        let xml = fs::read_to_string(dir.path().join("Metadata/model_settings.config")).unwrap();
        assert!(xml.contains(r#"transform="1 0 0 0 1 0 0 0 1 128 128 0""#));
        assert!(!xml.contains("mesh_stat"));
    }

    #[test]
    fn rels_stub_is_an_empty_relationships_document() {
        let dir = TempDir::new().unwrap();
        write_rels_stub(dir.path()).unwrap();

        let content =
            fs::read_to_string(dir.path().join("Metadata/_rels/model_settings.config.rels"))
                .unwrap();
        assert!(content.contains("<Relationships"));
        assert!(!content.contains("<Relationship "));
    }
}
