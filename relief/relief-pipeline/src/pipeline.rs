//! Fixed-order orchestration of a full pipeline run.

use std::path::Path;

use relief_align::align_overlay;
use relief_colors::{
    extract_color_model, parse_swap_instructions, ColorModel, ColorSource, Extraction,
};
use relief_compose::{compose, BooleanEngine};
use relief_pack::{
    detect_object_id, fix_build_transform, load_solid, merge_settings, repair_namespaces,
    save_solid, write_assembly_config, write_ranges_descriptor, write_rels_stub, PackageArchive,
};
use relief_ranges::{synthesize, validate_layer_heights, validate_sequence};
use relief_types::Solid;
use tracing::{info, warn};

use crate::config::{OutputFormat, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::export::SlicerExport;
use crate::repair::SolidRepair;

/// What a successful run produced, beyond the output package itself.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Z displacement of the overlay in the combined model (mm).
    pub z_offset: f64,
    /// XY scale factor actually applied to the overlay.
    pub applied_scale: f64,
    /// Detected overlay background height (mm).
    pub background_height: f64,
    /// Whether gap-fill geometry went into the union.
    pub fill_added: bool,
    /// Number of color swaps carried into the output package.
    pub color_swaps: usize,
    /// Non-fatal problems encountered along the way.
    pub warnings: Vec<String>,
}

/// The composition pipeline with its injected capabilities.
///
/// The boolean engine is mandatory; the slicer exporter is required only
/// for Bambu output, and the repair hook only when the configuration
/// asks for input repair.
pub struct Pipeline<'a, E: BooleanEngine> {
    engine: &'a E,
    exporter: Option<&'a dyn SlicerExport>,
    repairer: Option<&'a dyn SolidRepair>,
}

impl<'a, E: BooleanEngine> Pipeline<'a, E> {
    /// A pipeline with only the mandatory boolean engine.
    #[must_use]
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            exporter: None,
            repairer: None,
        }
    }

    /// Attach a slicer exporter for Bambu output.
    #[must_use]
    pub fn with_exporter(mut self, exporter: &'a dyn SlicerExport) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Attach an input-repair hook.
    #[must_use]
    pub fn with_repairer(mut self, repairer: &'a dyn SolidRepair) -> Self {
        self.repairer = Some(repairer);
        self
    }

    /// Run the pipeline end to end.
    ///
    /// Order is fixed: capability validation, color extraction, geometry
    /// loading, optional repair, alignment, composition, export, package
    /// rebuild. Geometry and export failures are fatal; color-metadata
    /// problems downgrade the run to colorless output and land in the
    /// report's warnings.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] per the taxonomy above.
    pub fn run(&self, config: &PipelineConfig) -> PipelineResult<PipelineReport> {
        // A missing slicer must fail the run before any geometry work.
        if config.output_format == OutputFormat::Bambu {
            match self.exporter {
                Some(exporter) if exporter.is_available() => {}
                Some(_) => {
                    return Err(PipelineError::config(
                        "slicer exporter is not available on this system",
                    ))
                }
                None => {
                    return Err(PipelineError::config(
                        "Bambu output requires a slicer exporter",
                    ))
                }
            }
        }

        let mut warnings = Vec::new();
        let color_model = self.resolve_color_model(config, &mut warnings)?;

        let mut base = load_solid(&config.base_path)?;
        let mut overlay = load_solid(&config.overlay_path)?;
        info!(
            base_faces = base.face_count(),
            overlay_faces = overlay.face_count(),
            "loaded input solids"
        );

        if config.repair_inputs {
            if let Some(repairer) = self.repairer {
                base = repairer.repair(base);
                overlay = repairer.repair(overlay);
            } else {
                warn!("input repair requested but no repair hook is attached");
                warnings.push("input repair requested but no repair hook attached".to_string());
            }
        }

        let pair = align_overlay(base, overlay, &config.align)?;
        let composition = compose(self.engine, &pair.base, &pair.overlay, &config.compose)?;

        let mut combined = composition.solid;
        match config.output_format {
            OutputFormat::Standard => {
                save_solid(&combined, &config.output_path)?;
                info!(output = %config.output_path.display(), "wrote standard package");
            }
            OutputFormat::Bambu => {
                // Centered at the origin with the bottom on the plate,
                // so the slicer places it on the bed.
                combined.center_on_origin();
                self.export_bambu(&combined, &config.output_path, &mut warnings)?;
            }
        }

        // Once a package exists on disk, metadata problems never discard
        // it; they downgrade to warnings.
        let color_swaps = if let Some(model) = &color_model {
            validate_layer_heights(model, pair.z_offset, combined.bounds().top_z());
            match self.rebuild_with_colors(config, model, pair.z_offset, &mut warnings) {
                Ok(swaps) => swaps,
                Err(e) => {
                    warn!(error = %e, "color-metadata rebuild failed, keeping the colorless package");
                    warnings.push(format!("color-metadata rebuild failed: {e}"));
                    0
                }
            }
        } else {
            0
        };

        Ok(PipelineReport {
            z_offset: pair.z_offset,
            applied_scale: pair.applied_scale,
            background_height: composition.background_height,
            fill_added: composition.fill_added,
            color_swaps,
            warnings,
        })
    }

    /// Resolve the color model from the configured source. Malformed or
    /// absent metadata downgrades to a colorless run.
    fn resolve_color_model(
        &self,
        config: &PipelineConfig,
        warnings: &mut Vec<String>,
    ) -> PipelineResult<Option<ColorModel>> {
        let extraction = match &config.color_source {
            ColorSource::Disabled => return Ok(None),
            ColorSource::Preserve => extract_color_model(&config.overlay_path)?,
            ColorSource::InjectText(text) => parse_swap_instructions(text),
        };
        match extraction {
            Extraction::Found(model) => {
                info!(swaps = model.layers.len(), "color model resolved");
                Ok(Some(model))
            }
            Extraction::NotPresent => {
                info!("no color metadata, producing colorless output");
                Ok(None)
            }
            Extraction::Malformed { details } => {
                warn!(details, "color metadata is malformed, producing colorless output");
                warnings.push(format!("color metadata is malformed: {details}"));
                Ok(None)
            }
        }
    }

    /// Write the combined solid through the slicer CLI via a scratch
    /// vanilla package, then repair the slicer's output document.
    ///
    /// The repair passes are best-effort: the exported package is usable
    /// without them, so their failure is a warning, not an abort.
    fn export_bambu(
        &self,
        combined: &Solid,
        output: &Path,
        warnings: &mut Vec<String>,
    ) -> PipelineResult<()> {
        let Some(exporter) = self.exporter else {
            // Checked at the top of run().
            return Err(PipelineError::config(
                "Bambu output requires a slicer exporter",
            ));
        };

        let scratch = tempfile::TempDir::new().map_err(relief_pack::PackError::Io)?;
        let plain = scratch.path().join("combined_model.3mf");
        save_solid(combined, &plain)?;
        exporter.export(&plain, output)?;

        if let Err(e) = repair_exported_package(output) {
            warn!(error = %e, "schema repair failed, keeping the exported package as is");
            warnings.push(format!("schema repair failed: {e}"));
        }
        Ok(())
    }

    /// Rebuild the output package with color metadata. Returns the number
    /// of swaps written.
    fn rebuild_with_colors(
        &self,
        config: &PipelineConfig,
        model: &ColorModel,
        z_offset: f64,
        warnings: &mut Vec<String>,
    ) -> relief_pack::PackResult<usize> {
        let ranges = synthesize(model, z_offset);
        if let Err(e) = validate_sequence(&ranges) {
            warn!(error = %e, "synthesized ranges failed validation, skipping color rebuild");
            warnings.push(format!("height ranges failed validation: {e}"));
            return Ok(0);
        }

        let archive = PackageArchive::unpack(&config.output_path)?;
        let object_id = detect_object_id(archive.root());
        write_ranges_descriptor(archive.root(), object_id, &ranges)?;
        merge_settings(archive.root(), &model.filament_colors)?;
        write_assembly_config(archive.root())?;
        write_rels_stub(archive.root())?;
        archive.repack(&config.output_path)?;

        info!(
            object_id,
            swaps = ranges.len(),
            "rebuilt package with color metadata"
        );
        Ok(ranges.len())
    }
}

/// Re-run the build-transform fix and namespace repair over an exported
/// package. Transform fix first: it re-serializes the document the
/// namespace repair then cleans up.
fn repair_exported_package(output: &Path) -> relief_pack::PackResult<()> {
    let archive = PackageArchive::unpack(output)?;
    fix_build_transform(archive.root())?;
    repair_namespaces(archive.root())?;
    archive.repack(output)
}
