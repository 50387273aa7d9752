//! Reading and writing solid geometry as 3MF.
//!
//! Loading accepts any 3MF (all mesh objects are concatenated into one
//! solid, vertex indices offset per object). Saving writes a minimal
//! standards-conforming package: content types, the package relationship,
//! and a single-object model document. The saved form is what the
//! `Standard` output format ships and what the slicer CLI is handed as
//! input.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;

use nalgebra::Point3;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use relief_types::Solid;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{PackError, PackResult};

/// 3MF core namespace URI.
const NAMESPACE_3MF: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// Load solid geometry from a 3MF package.
///
/// All mesh objects in the package are combined into a single solid.
///
/// # Errors
///
/// Returns an error when the file cannot be read, is not a ZIP archive,
/// or carries no parseable model document.
pub fn load_solid<P: AsRef<Path>>(path: P) -> PackResult<Solid> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PackError::PackageNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PackError::Io(e)
        }
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| PackError::invalid_archive(format!("invalid ZIP archive: {e}")))?;

    let content = read_model_document(&mut archive)?;
    let solid = parse_model_document(&content)?;
    debug!(
        vertices = solid.vertex_count(),
        faces = solid.face_count(),
        "loaded solid from package"
    );
    Ok(solid)
}

/// Read the model document out of the archive, trying the standard path
/// first and any `.model` entry second.
fn read_model_document<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> PackResult<String> {
    for name in ["3D/3dmodel.model", "3d/3dmodel.model"] {
        if let Ok(mut entry) = archive.by_name(name) {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return Ok(content);
        }
    }

    let model_entry = (0..archive.len()).find_map(|i| {
        let entry = archive.by_index(i).ok()?;
        entry
            .name()
            .to_lowercase()
            .ends_with(".model")
            .then(|| entry.name().to_string())
    });
    if let Some(name) = model_entry {
        let mut entry = archive
            .by_name(&name)
            .map_err(|e| PackError::invalid_archive(format!("failed to read {name}: {e}")))?;
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        return Ok(content);
    }

    Err(PackError::MissingEntry {
        name: "3D/3dmodel.model".to_string(),
    })
}

/// Parse vertices and triangles out of a model document.
fn parse_model_document(content: &str) -> PackResult<Solid> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut solid = Solid::new();
    let mut in_mesh = false;
    let mut vertex_offset: u32 = 0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"mesh" => {
                    in_mesh = true;
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        vertex_offset = solid.vertices.len() as u32;
                    }
                }
                b"vertex" if in_mesh => solid.vertices.push(parse_vertex(e)?),
                b"triangle" if in_mesh => solid.faces.push(parse_triangle(e, vertex_offset)?),
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"mesh" {
                    in_mesh = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PackError::invalid_content(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if solid.is_empty() {
        return Err(PackError::invalid_content(
            "model document carries no mesh geometry",
        ));
    }
    Ok(solid)
}

fn parse_vertex(element: &BytesStart<'_>) -> PackResult<Point3<f64>> {
    let mut coords = [0.0_f64; 3];
    for attr in element.attributes().flatten() {
        let value = std::str::from_utf8(&attr.value)?;
        let slot = match attr.key.local_name().as_ref() {
            b"x" => 0,
            b"y" => 1,
            b"z" => 2,
            _ => continue,
        };
        coords[slot] = value
            .parse()
            .map_err(|e| PackError::invalid_content(format!("invalid vertex coordinate: {e}")))?;
    }
    Ok(Point3::new(coords[0], coords[1], coords[2]))
}

fn parse_triangle(element: &BytesStart<'_>, vertex_offset: u32) -> PackResult<[u32; 3]> {
    let mut indices = [0_u32; 3];
    for attr in element.attributes().flatten() {
        let value = std::str::from_utf8(&attr.value)?;
        let slot = match attr.key.local_name().as_ref() {
            b"v1" => 0,
            b"v2" => 1,
            b"v3" => 2,
            _ => continue,
        };
        indices[slot] = value
            .parse()
            .map_err(|e| PackError::invalid_content(format!("invalid triangle index: {e}")))?;
    }
    Ok([
        indices[0] + vertex_offset,
        indices[1] + vertex_offset,
        indices[2] + vertex_offset,
    ])
}

/// Save a solid as a minimal standards-conforming 3MF package.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_solid<P: AsRef<Path>>(solid: &Solid, path: P) -> PackResult<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)
        .map_err(|e| PackError::invalid_archive(format!("failed to start content types: {e}")))?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file("_rels/.rels", options)
        .map_err(|e| PackError::invalid_archive(format!("failed to start relationships: {e}")))?;
    zip.write_all(RELS_XML.as_bytes())?;

    let model_xml = build_model_document(solid)?;
    zip.start_file("3D/3dmodel.model", options)
        .map_err(|e| PackError::invalid_archive(format!("failed to start model document: {e}")))?;
    zip.write_all(model_xml.as_bytes())?;

    zip.finish()
        .map_err(|e| PackError::invalid_archive(format!("failed to finalize archive: {e}")))?;
    Ok(())
}

/// Content types document for a minimal 3MF.
const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

/// Package relationship document for a minimal 3MF.
const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

fn xml_err(what: &str, e: impl std::fmt::Display) -> PackError {
    PackError::invalid_content(format!("failed to write {what}: {e}"))
}

/// Build the model document for a single-object package.
fn build_model_document(solid: &Solid) -> PackResult<String> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| xml_err("XML declaration", e))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("xmlns", NAMESPACE_3MF));
    model.push_attribute(("unit", "millimeter"));
    model.push_attribute(("xml:lang", "en-US"));
    writer
        .write_event(Event::Start(model))
        .map_err(|e| xml_err("model element", e))?;

    writer
        .write_event(Event::Start(BytesStart::new("resources")))
        .map_err(|e| xml_err("resources element", e))?;

    let mut object = BytesStart::new("object");
    object.push_attribute(("id", "1"));
    object.push_attribute(("type", "model"));
    writer
        .write_event(Event::Start(object))
        .map_err(|e| xml_err("object element", e))?;
    writer
        .write_event(Event::Start(BytesStart::new("mesh")))
        .map_err(|e| xml_err("mesh element", e))?;

    writer
        .write_event(Event::Start(BytesStart::new("vertices")))
        .map_err(|e| xml_err("vertices element", e))?;
    for v in &solid.vertices {
        let mut vertex = BytesStart::new("vertex");
        vertex.push_attribute(("x", format!("{:.6}", v.x).as_str()));
        vertex.push_attribute(("y", format!("{:.6}", v.y).as_str()));
        vertex.push_attribute(("z", format!("{:.6}", v.z).as_str()));
        writer
            .write_event(Event::Empty(vertex))
            .map_err(|e| xml_err("vertex", e))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("vertices")))
        .map_err(|e| xml_err("vertices end", e))?;

    writer
        .write_event(Event::Start(BytesStart::new("triangles")))
        .map_err(|e| xml_err("triangles element", e))?;
    for &[v1, v2, v3] in &solid.faces {
        let mut triangle = BytesStart::new("triangle");
        triangle.push_attribute(("v1", v1.to_string().as_str()));
        triangle.push_attribute(("v2", v2.to_string().as_str()));
        triangle.push_attribute(("v3", v3.to_string().as_str()));
        writer
            .write_event(Event::Empty(triangle))
            .map_err(|e| xml_err("triangle", e))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("triangles")))
        .map_err(|e| xml_err("triangles end", e))?;

    writer
        .write_event(Event::End(BytesEnd::new("mesh")))
        .map_err(|e| xml_err("mesh end", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("object")))
        .map_err(|e| xml_err("object end", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("resources")))
        .map_err(|e| xml_err("resources end", e))?;

    writer
        .write_event(Event::Start(BytesStart::new("build")))
        .map_err(|e| xml_err("build element", e))?;
    let mut item = BytesStart::new("item");
    item.push_attribute(("objectid", "1"));
    writer
        .write_event(Event::Empty(item))
        .map_err(|e| xml_err("build item", e))?;
    writer
        .write_event(Event::End(BytesEnd::new("build")))
        .map_err(|e| xml_err("build end", e))?;

    writer
        .write_event(Event::End(BytesEnd::new("model")))
        .map_err(|e| xml_err("model end", e))?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use relief_types::rectangular_slab;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slab.3mf");
        let slab = rectangular_slab(Point3::origin(), Vector3::new(20.0, 10.0, 5.0));

        save_solid(&slab, &path).unwrap();
        let loaded = load_solid(&path).unwrap();

        assert_eq!(loaded.vertex_count(), slab.vertex_count());
        assert_eq!(loaded.face_count(), slab.face_count());
        let bounds = loaded.bounds();
        assert!((bounds.width() - 20.0).abs() < 1e-6);
        assert!((bounds.top_z() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn multiple_objects_are_concatenated() {
        let xml = r#"<?xml version="1.0"?>
<model xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources>
    <object id="1" type="model"><mesh>
      <vertices>
        <vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/>
      </vertices>
      <triangles><triangle v1="0" v2="1" v3="2"/></triangles>
    </mesh></object>
    <object id="2" type="model"><mesh>
      <vertices>
        <vertex x="0" y="0" z="1"/><vertex x="1" y="0" z="1"/><vertex x="0" y="1" z="1"/>
      </vertices>
      <triangles><triangle v1="0" v2="1" v3="2"/></triangles>
    </mesh></object>
  </resources>
</model>"#;
        let solid = parse_model_document(xml).unwrap();
        assert_eq!(solid.vertex_count(), 6);
        assert_eq!(solid.faces, vec![[0, 1, 2], [3, 4, 5]]);
    }

    #[test]
    fn geometry_free_package_is_rejected() {
        let err = parse_model_document("<model><resources/></model>").unwrap_err();
        assert!(matches!(err, PackError::InvalidContent { .. }));
    }

    #[test]
    fn missing_package_is_reported_as_such() {
        let err = load_solid("/nonexistent/model.3mf").unwrap_err();
        assert!(matches!(err, PackError::PackageNotFound { .. }));
    }
}
