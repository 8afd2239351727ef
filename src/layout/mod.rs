//! Auto-arrange for the join graph canvas.
//!
//! Phases: graph analysis (dedupe, cycle breaking, ranks), barycenter
//! ordering within ranks, then left-to-right column placement.

mod analysis;
mod engine;
mod placement;
mod types;

pub use engine::{ArrangeEngine, LayoutError};
pub use types::{ArrangeEdge, ArrangeNode, Arrangement, Placement};
