//! Spatial index for plot worlds.
//!
//! A height-balanced R-tree over [`GridBox`](plot_grid::GridBox) keys. Each
//! entry maps one rectangle of cells to the plot owning it; a merged plot
//! with an irregular shape owns several entries.
//!
//! # Guarantees
//!
//! - Boxes of different plots never overlap (`insert` refuses them)
//! - Point lookups return at most one plot
//! - All leaves sit at the same depth, so lookups cost `O(log n + k)`
//!
//! The split heuristic only affects how tight the node boxes are, never
//! which plots a query returns.

mod error;
mod rtree;

pub use error::{IndexError, IndexResult};
pub use rtree::{IndexEntry, IndexStats, MAX_ENTRIES, MIN_ENTRIES, SpatialIndex};
