//! Merging color settings into `Metadata/project_settings.config`.
//!
//! The settings file is JSON despite its extension. Only the minimal
//! field set is written: giving the slicer more (filament ids, vendor
//! fields) stops it from auto-matching the loaded filaments to the
//! colors.

use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::PackResult;

/// Merge filament colors into the project settings of an unpacked
/// package.
///
/// Existing settings are preserved; an unreadable settings file is
/// replaced rather than failing the rebuild. With an empty color list
/// the file is written back unchanged (creating it if absent).
///
/// # Errors
///
/// Returns an error when the file cannot be read or written.
pub fn merge_settings(root: &Path, filament_colors: &[String]) -> PackResult<()> {
    let path = root.join("Metadata").join("project_settings.config");

    let mut config: Map<String, Value> = if path.exists() {
        match serde_json::from_str(&fs::read_to_string(&path)?) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!("project settings are not a JSON object, rebuilding from scratch");
                Map::new()
            }
            Err(e) => {
                warn!(error = %e, "project settings are unreadable, rebuilding from scratch");
                Map::new()
            }
        }
    } else {
        debug!("no project settings in package, creating them");
        Map::new()
    };

    if !filament_colors.is_empty() {
        let slots = filament_colors.len();
        config.insert("filament_colour".to_string(), json!(filament_colors));
        config.insert("filament_type".to_string(), json!(vec!["PLA"; slots]));
        // Multi-material mode; without these the slicer ignores the
        // height-range extruder assignments.
        config.insert("enable_prime_tower".to_string(), json!("1"));
        config.insert("single_extruder_multi_material".to_string(), json!("1"));
        info!(slots, "merged filament colors into project settings");
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(&Value::Object(config))?)?;
    Ok(())
}
