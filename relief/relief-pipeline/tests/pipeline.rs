//! End-to-end pipeline runs against stub capabilities.
//!
//! These tests exercise `Pipeline::run` with an in-process boolean engine
//! and a copy-through slicer stub, so every stage from package loading to
//! the color-metadata rebuild runs against real 3MF files on disk.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::Cell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use relief_colors::ColorSource;
use relief_compose::{BooleanEngine, EngineResult};
use relief_pack::{load_solid, save_solid};
use relief_pipeline::{
    ExportResult, OutputFormat, Pipeline, PipelineConfig, PipelineError, SlicerExport, SolidRepair,
};
use relief_types::{rectangular_slab, Point3, Solid, Vector3};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Boolean engine that concatenates geometry instead of computing real
/// CSG. Intersections pass the first operand through, which is exact for
/// an overlay already inside the clipping prism.
struct StubEngine;

impl BooleanEngine for StubEngine {
    fn union(&self, parts: &[Solid]) -> EngineResult<Solid> {
        let mut combined = Solid::default();
        for part in parts {
            combined.merge(part);
        }
        Ok(combined)
    }

    fn intersection(&self, a: &Solid, _b: &Solid) -> EngineResult<Solid> {
        Ok(a.clone())
    }
}

/// Slicer stand-in that copies the scratch package to the output path.
struct CopyExporter {
    available: bool,
}

impl SlicerExport for CopyExporter {
    fn is_available(&self) -> bool {
        self.available
    }

    fn export(&self, input: &Path, output: &Path) -> ExportResult<()> {
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Repair hook that counts invocations and passes geometry through.
struct CountingRepair {
    calls: Cell<usize>,
}

impl SolidRepair for CountingRepair {
    fn repair(&self, solid: Solid) -> Solid {
        self.calls.set(self.calls.get() + 1);
        solid
    }
}

const SWAP_TEXT: &str = "\
Filaments Used:
PLA BambuLab Basic Black
PLA BambuLab Basic Cobalt Blue
PLA BambuLab Basic Sunflower Yellow
PLA BambuLab Matte Ivory White

Swap Instructions:
Start with Black
At layer #8 (0.72mm) swap to Cobalt Blue
At layer #15 (1.28mm) swap to Sunflower Yellow
At layer #22 (2.00mm) swap to Ivory White
";

/// Write a 40x40x5 base and a 10x10x2 overlay into `dir` and return a
/// configuration pointing at them.
fn config_for(dir: &TempDir) -> PipelineConfig {
    let base = rectangular_slab(Point3::origin(), Vector3::new(40.0, 40.0, 5.0));
    let overlay = rectangular_slab(Point3::origin(), Vector3::new(10.0, 10.0, 2.0));

    let base_path = dir.path().join("base.3mf");
    let overlay_path = dir.path().join("overlay.3mf");
    save_solid(&base, &base_path).unwrap();
    save_solid(&overlay, &overlay_path).unwrap();

    PipelineConfig {
        overlay_path,
        base_path,
        output_path: dir.path().join("out.3mf"),
        ..PipelineConfig::default()
    }
}

/// Read one entry out of a finished package, or `None` when absent.
fn package_entry(path: &Path, name: &str) -> Option<String> {
    let file = File::open(path).unwrap();
    let mut zip = ZipArchive::new(file).unwrap();
    let mut content = String::new();
    let result = match zip.by_name(name) {
        Ok(mut entry) => {
            entry.read_to_string(&mut content).unwrap();
            Some(content)
        }
        Err(_) => None,
    };
    result
}

#[test]
fn standard_run_writes_a_combined_package() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.color_source = ColorSource::Disabled;

    let report = Pipeline::new(&StubEngine).run(&config).unwrap();

    // base top 5.0 minus the default 0.1 mm embed
    assert!((report.z_offset - 4.9).abs() < 1e-9);
    // 10x10 overlay stretched to fill the 40x40 base
    assert!((report.applied_scale - 4.0).abs() < 1e-9);
    assert_eq!(report.color_swaps, 0);
    assert!(report.warnings.is_empty());

    let combined = load_solid(&config.output_path).unwrap();
    assert!(!combined.is_empty());
    // base plus overlay geometry both in the union
    assert!(combined.face_count() >= 24);

    assert!(package_entry(&config.output_path, "Metadata/layer_config_ranges.xml").is_none());
}

#[test]
fn injected_swap_text_lands_in_the_output_package() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.color_source = ColorSource::InjectText(SWAP_TEXT.to_string());

    let report = Pipeline::new(&StubEngine).run(&config).unwrap();
    assert_eq!(report.color_swaps, 3);
    assert!(report.warnings.is_empty());

    let ranges = package_entry(&config.output_path, "Metadata/layer_config_ranges.xml")
        .expect("height-range descriptor");
    assert_eq!(ranges.matches("<range").count(), 3);
    assert!(ranges.contains(r#"opt_key="extruder""#));
    assert!(ranges.contains(r#"opt_key="layer_height">0.08"#));

    let settings = package_entry(&config.output_path, "Metadata/project_settings.config")
        .expect("merged settings");
    let json: serde_json::Value = serde_json::from_str(&settings).unwrap();
    assert_eq!(json["filament_colour"].as_array().unwrap().len(), 4);
    assert_eq!(json["filament_colour"][0], "#000000");
    assert_eq!(json["enable_prime_tower"], "1");

    let assembly = package_entry(&config.output_path, "Metadata/model_settings.config")
        .expect("assembly configuration");
    assert!(assembly.contains("ReliefForge"));
    assert!(
        package_entry(&config.output_path, "Metadata/_rels/model_settings.config.rels").is_some()
    );
}

#[test]
fn preserved_metadata_comes_from_the_overlay_package() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);

    // Rebuild the overlay package with relief-generator metadata inside.
    let model_doc = package_entry(&config.overlay_path, "3D/3dmodel.model").unwrap();
    let gcode = r##"<?xml version="1.0" encoding="utf-8"?>
<custom_gcodes_per_layer>
  <plate>
    <layer top_z="0.72" type="2" extruder="2" color="#0047AB"/>
    <layer top_z="1.28" type="2" extruder="3" color="#FFDA03"/>
  </plate>
</custom_gcodes_per_layer>"##;
    let settings = r##"{"filament_colour": ["#000000", "#0047AB", "#FFDA03"]}"##;

    let relief_path = dir.path().join("relief.3mf");
    write_package(
        &relief_path,
        &[
            ("3D/3dmodel.model", &model_doc),
            ("Metadata/custom_gcode_per_layer.xml", gcode),
            ("Metadata/project_settings.config", settings),
        ],
    );
    config.overlay_path = relief_path;
    config.color_source = ColorSource::Preserve;

    let report = Pipeline::new(&StubEngine).run(&config).unwrap();
    assert_eq!(report.color_swaps, 2);

    let ranges = package_entry(&config.output_path, "Metadata/layer_config_ranges.xml")
        .expect("height-range descriptor");
    assert_eq!(ranges.matches("<range").count(), 2);
}

fn write_package(path: &PathBuf, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn bambu_output_without_an_exporter_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.output_format = OutputFormat::Bambu;

    let err = Pipeline::new(&StubEngine).run(&config).unwrap_err();
    assert!(matches!(err, PipelineError::Config { .. }));

    let unavailable = CopyExporter { available: false };
    let err = Pipeline::new(&StubEngine)
        .with_exporter(&unavailable)
        .run(&config)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config { .. }));

    // Nothing was written before the failure.
    assert!(!config.output_path.exists());
}

#[test]
fn bambu_run_centers_the_model_and_rebuilds_colors() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.output_format = OutputFormat::Bambu;
    config.color_source = ColorSource::InjectText(SWAP_TEXT.to_string());

    let exporter = CopyExporter { available: true };
    let report = Pipeline::new(&StubEngine)
        .with_exporter(&exporter)
        .run(&config)
        .unwrap();
    assert_eq!(report.color_swaps, 3);

    // Centered in XY with the bottom on the plate.
    let combined = load_solid(&config.output_path).unwrap();
    let bounds = combined.bounds();
    assert!((bounds.min.x + 20.0).abs() < 1e-9);
    assert!((bounds.max.x - 20.0).abs() < 1e-9);
    assert!(bounds.min.z.abs() < 1e-9);

    assert!(package_entry(&config.output_path, "Metadata/layer_config_ranges.xml").is_some());
}

#[test]
fn malformed_swap_text_downgrades_to_a_colorless_run() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.color_source = ColorSource::InjectText(
        "Swap Instructions:\nAt layer #8 (0.72.9mm) swap to Red\n".to_string(),
    );

    let report = Pipeline::new(&StubEngine).run(&config).unwrap();
    assert_eq!(report.color_swaps, 0);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("malformed"));

    assert!(config.output_path.exists());
    assert!(package_entry(&config.output_path, "Metadata/layer_config_ranges.xml").is_none());
}

#[test]
fn repair_hook_runs_over_both_inputs() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.color_source = ColorSource::Disabled;
    config.repair_inputs = true;

    let repairer = CountingRepair {
        calls: Cell::new(0),
    };
    Pipeline::new(&StubEngine)
        .with_repairer(&repairer)
        .run(&config)
        .unwrap();
    assert_eq!(repairer.calls.get(), 2);
}

#[test]
fn missing_repair_hook_is_a_warning_not_an_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.color_source = ColorSource::Disabled;
    config.repair_inputs = true;

    let report = Pipeline::new(&StubEngine).run(&config).unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("repair"));
}
