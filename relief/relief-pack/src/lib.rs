//! 3MF package I/O and Bambu Studio container rebuilding.
//!
//! Two layers live here:
//!
//! - **Geometry I/O** ([`load_solid`] / [`save_solid`]): read a
//!   [`relief_types::Solid`] out of any 3MF and write a minimal
//!   standards-conforming one.
//! - **Container rebuilding**: unpack a slicer-produced package into a
//!   scratch directory ([`PackageArchive`]), rewrite its metadata
//!   documents in place (height-range descriptor, project settings,
//!   assembly configuration, build transform, namespace repair), then
//!   repack atomically over the destination.
//!
//! The rewrite functions each take the unpacked package root, so a
//! rebuild is one unpack and one repack regardless of how many documents
//! change. [`fix_build_transform`] must run before [`repair_namespaces`]:
//! the transform fix re-serializes the model document and can reintroduce
//! the prefix problems the repair pass removes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod archive;
mod assembly;
mod error;
mod ranges_doc;
mod settings;
mod threemf;
mod transform;

pub use archive::PackageArchive;
pub use assembly::{detect_object_id, write_assembly_config, write_rels_stub};
pub use error::{PackError, PackResult};
pub use ranges_doc::write_ranges_descriptor;
pub use settings::merge_settings;
pub use threemf::{load_solid, save_solid};
pub use transform::{fix_build_transform, repair_namespaces};
