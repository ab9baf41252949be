//! Plot topology engine.
//!
//! Owns every plot of a world and keeps it consistent with the spatial
//! index. Plots are sets of cells; the index stores a rectangle cover of
//! each set:
//!
//! ```text
//!   region            cover
//!   ##.               AA.
//!   ###     ──►       AAB      2 boxes, one PlotId
//!   ##.               AA.
//! ```
//!
//! # Invariants
//!
//! - Every plot region is non-empty and 4-connected.
//! - No cell belongs to two plots.
//! - The index holds exactly the cover boxes of the live plots.
//!
//! Mutations check these before touching any state, so a failed call is
//! invisible.

mod cover;
mod error;
mod plot;
mod region;
mod topology;

pub use error::{TopologyError, TopologyResult};
pub use plot::{FlagPolicy, FlagSet, Plot, PlotMembers, PlotRecord, PlotSnapshot};
pub use region::PlotRegion;
pub use topology::PlotTopology;
