//! Build-transform fix and namespace repair for slicer-produced packages.
//!
//! The slicer CLI leaves two problems behind in `3D/3dmodel.model`:
//!
//! 1. The build item transform can place the object off the plate or
//!    below it. [`fix_build_transform`] recenters on a 256x256 mm plate
//!    and lifts the bottom to Z=0.
//! 2. The XML serializer emits generated namespace prefixes (`ns0:` on
//!    the core namespace, `ns1:` on the production extension) while the
//!    document declares `requiredextensions="p"`, and omits the
//!    `BambuStudio` vendor namespace, so Bambu Studio rejects the file
//!    or treats it as another vendor's. [`repair_namespaces`] rewrites
//!    the prefixes and injects the vendor declaration.
//!
//! [`fix_build_transform`] must run first: it re-serializes the document
//! and can reintroduce exactly the prefixes the repair pass removes. The
//! repair is a textual pass and a no-op on an already-clean document.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info, warn};

use crate::assembly::object_file_ids;
use crate::error::{PackError, PackResult};

/// Production extension namespace the slicer aliases as `ns1`.
const PRODUCTION_NS: &str = "http://schemas.microsoft.com/3dmanufacturing/production/2015/06";

/// Core namespace the slicer aliases as `ns0`.
const CORE_NS: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// Vendor namespace whose absence makes Bambu Studio treat the package
/// as another vendor's.
const BAMBU_VENDOR_NS: &str = "http://schemas.bambulab.com/package/2021";

/// Rewrite the build item transform of an unpacked package so the object
/// sits centered at (128, 128) with its bottom on the plate.
///
/// The lift is derived from the lowest vertex of the object mesh
/// document. Packages without an object mesh document or build item are
/// left alone, with a warning.
///
/// # Errors
///
/// Returns an error when the geometry document cannot be rewritten.
pub fn fix_build_transform(root: &Path) -> PackResult<()> {
    let Some(z_min) = object_min_z(root) else {
        warn!("no object mesh document in package, skipping transform fix");
        return Ok(());
    };

    let model_path = root.join("3D").join("3dmodel.model");
    let Ok(xml) = fs::read_to_string(&model_path) else {
        warn!("no geometry document in package, skipping transform fix");
        return Ok(());
    };

    let z_lift = -z_min;
    let transform = format!("1 0 0 0 1 0 0 0 1 128 128 {z_lift}");
    let (fixed, found) = rewrite_build_transform(&xml, &transform)?;
    if !found {
        warn!("no build item in geometry document, skipping transform fix");
        return Ok(());
    }

    fs::write(&model_path, fixed)?;
    info!(z_lift, "fixed build plate transform");
    Ok(())
}

/// Lowest vertex Z of the first object mesh document.
fn object_min_z(root: &Path) -> Option<f64> {
    let mut ids = object_file_ids(root);
    ids.sort_unstable();
    let id = ids.first()?;
    let path = root.join("3D").join("Objects").join(format!("object_{id}.model"));
    let xml = fs::read_to_string(path).ok()?;

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);
    let mut min_z: Option<f64> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"vertex" {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"z" {
                            if let Ok(z) = std::str::from_utf8(&attr.value)
                                .unwrap_or("")
                                .parse::<f64>()
                            {
                                min_z = Some(min_z.map_or(z, |m: f64| m.min(z)));
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    min_z
}

/// Replace the transform attribute of the first build item, passing all
/// other events through untouched. Returns the rewritten document and
/// whether a build item was found.
fn rewrite_build_transform(xml: &str, transform: &str) -> PackResult<(String, bool)> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut in_build = false;
    let mut rewritten = false;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| PackError::invalid_content(format!("XML parse error: {e}")))?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) if e.local_name().as_ref() == b"build" => {
                in_build = true;
                write_through(&mut writer, &event)?;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"build" => {
                in_build = false;
                write_through(&mut writer, &event)?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if in_build && !rewritten && e.local_name().as_ref() == b"item" =>
            {
                let patched = patch_transform(e, transform)?;
                let patched_event = if matches!(event, Event::Start(_)) {
                    Event::Start(patched)
                } else {
                    Event::Empty(patched)
                };
                write_through(&mut writer, &patched_event)?;
                rewritten = true;
            }
            other => write_through(&mut writer, &other)?,
        }
        buf.clear();
    }

    Ok((String::from_utf8(writer.into_inner())?, rewritten))
}

fn write_through<W: std::io::Write>(writer: &mut Writer<W>, event: &Event<'_>) -> PackResult<()> {
    writer
        .write_event(event.clone())
        .map_err(|e| PackError::invalid_content(format!("failed to rewrite XML: {e}")))
}

/// Copy an element, replacing (or adding) its transform attribute.
fn patch_transform(element: &BytesStart<'_>, transform: &str) -> PackResult<BytesStart<'static>> {
    let name = String::from_utf8(element.name().as_ref().to_vec())?;
    let mut patched = BytesStart::new(name);
    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() != b"transform" {
            patched.push_attribute(attr);
        }
    }
    patched.push_attribute(("transform", transform));
    Ok(patched)
}

/// Repair the namespace declarations of the geometry document.
///
/// Three textual fixes, in order: alias the production extension as `p`
/// instead of the generated `ns1`, declare the `BambuStudio` vendor
/// namespace, and fold the `ns0` prefix into the default namespace.
/// Running the repair on an already-clean document changes nothing.
///
/// # Errors
///
/// Returns an error when the geometry document cannot be rewritten.
pub fn repair_namespaces(root: &Path) -> PackResult<()> {
    let model_path = root.join("3D").join("3dmodel.model");
    let Ok(mut xml) = fs::read_to_string(&model_path) else {
        warn!("no geometry document in package, skipping namespace repair");
        return Ok(());
    };

    let ns1_decl = format!("xmlns:ns1=\"{PRODUCTION_NS}\"");
    if xml.contains(&ns1_decl) && xml.contains("requiredextensions=\"p\"") {
        xml = xml.replace(&ns1_decl, &format!("xmlns:p=\"{PRODUCTION_NS}\""));
        xml = xml.replace("ns1:", "p:");
        debug!("aliased production extension as p");
    }

    if !xml.contains("xmlns:BambuStudio=") {
        xml = xml.replace(
            "requiredextensions=\"p\"",
            &format!("requiredextensions=\"p\" xmlns:BambuStudio=\"{BAMBU_VENDOR_NS}\""),
        );
        debug!("declared vendor namespace");
    }

    let ns0_decl = format!("xmlns:ns0=\"{CORE_NS}\"");
    if xml.contains(&ns0_decl) && xml.contains("<ns0:model") {
        xml = xml.replace(&ns0_decl, &format!("xmlns=\"{CORE_NS}\""));
        xml = xml.replace("<ns0:", "<");
        xml = xml.replace("</ns0:", "</");
        debug!("folded ns0 prefix into the default namespace");
    }

    fs::write(&model_path, xml)?;
    info!("repaired namespace declarations");
    Ok(())
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

    const OBJECT_MODEL: &str = r#"<?xml version="1.0"?>
<model xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources><object id="1"><mesh>
    <vertices>
      <vertex x="0" y="0" z="-1.5"/><vertex x="10" y="0" z="4"/><vertex x="0" y="10" z="4"/>
    </vertices>
    <triangles><triangle v1="0" v2="1" v3="2"/></triangles>
  </mesh></object></resources>
</model>"#;

    const MAIN_MODEL: &str = r#"<?xml version="1.0"?>
<model xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources><object id="2" type="model"/></resources>
  <build><item objectid="2" transform="1 0 0 0 1 0 0 0 1 50 60 0"/></build>
</model>"#;

    #[test]
    fn transform_fix_centers_and_lifts_to_the_plate() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/Objects/object_1.model", OBJECT_MODEL);
        write_file(dir.path(), "3D/3dmodel.model", MAIN_MODEL);

        fix_build_transform(dir.path()).unwrap();

        let xml = fs::read_to_string(dir.path().join("3D/3dmodel.model")).unwrap();
        assert!(xml.contains(r#"transform="1 0 0 0 1 0 0 0 1 128 128 1.5""#));
        assert!(!xml.contains("50 60 0"));
    }

    #[test]
    fn transform_fix_without_object_document_is_a_noop() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/3dmodel.model", MAIN_MODEL);

        fix_build_transform(dir.path()).unwrap();

        let xml = fs::read_to_string(dir.path().join("3D/3dmodel.model")).unwrap();
        assert!(xml.contains("50 60 0"));
    }

    const SLICER_MODEL: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        "\n",
        r#"<ns0:model xmlns:ns0="http://schemas.microsoft.com/3dmanufacturing/core/2015/02" xmlns:ns1="http://schemas.microsoft.com/3dmanufacturing/production/2015/06" requiredextensions="p" unit="millimeter">"#,
        "\n",
        r#"  <ns0:resources><ns0:object id="2" ns1:UUID="00000001-0000-0000-0000-000000000002"/></ns0:resources>"#,
        "\n",
        r#"</ns0:model>"#,
    );

    #[test]
    fn namespace_repair_rewrites_all_three_problems() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/3dmodel.model", SLICER_MODEL);

        repair_namespaces(dir.path()).unwrap();

        let xml = fs::read_to_string(dir.path().join("3D/3dmodel.model")).unwrap();
        assert!(xml.contains(r#"xmlns:p="http://schemas.microsoft.com/3dmanufacturing/production/2015/06""#));
        assert!(xml.contains(r#"p:UUID="00000001-0000-0000-0000-000000000002""#));
        assert!(xml.contains(r#"xmlns:BambuStudio="http://schemas.bambulab.com/package/2021""#));
        assert!(xml.contains(r#"<model xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02""#));
        assert!(!xml.contains("ns0:"));
        assert!(!xml.contains("ns1:"));
    }

    #[test]
    fn namespace_repair_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/3dmodel.model", SLICER_MODEL);

        repair_namespaces(dir.path()).unwrap();
        let first = fs::read_to_string(dir.path().join("3D/3dmodel.model")).unwrap();

        repair_namespaces(dir.path()).unwrap();
        let second = fs::read_to_string(dir.path().join("3D/3dmodel.model")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn transform_fix_then_repair_leaves_a_clean_document() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "3D/Objects/object_1.model", OBJECT_MODEL);
        write_file(dir.path(), "3D/3dmodel.model", SLICER_MODEL);

        fix_build_transform(dir.path()).unwrap();
        repair_namespaces(dir.path()).unwrap();

        let xml = fs::read_to_string(dir.path().join("3D/3dmodel.model")).unwrap();
        assert!(!xml.contains("ns0:"));
        assert!(xml.contains("xmlns:BambuStudio="));
    }
}
