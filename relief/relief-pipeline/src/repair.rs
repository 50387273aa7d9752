//! The optional input-repair capability.

use relief_types::Solid;

/// A mesh-repair hook invoked over both input solids before alignment.
///
/// The pipeline carries no repair heuristics of its own; callers that
/// have them (hole filling, winding fixes) inject an implementation and
/// enable `repair_inputs` in the configuration. Repair is best-effort by
/// contract: implementations return the input unchanged when they cannot
/// improve it, and log rather than fail.
pub trait SolidRepair {
    /// Repair a solid, or return it unchanged.
    fn repair(&self, solid: Solid) -> Solid;
}
