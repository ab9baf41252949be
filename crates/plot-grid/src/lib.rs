//! Plot grid addressing
//!
//! Value types shared by the index, topology and service crates:
//!
//! - [`GridCoord`]: one claimable cell, ordered row-major
//! - [`PlotId`]: world + home cell + claim generation
//! - [`GridBox`]: inclusive rectangle of cells, the index key
//! - [`GridLayout`]: plot size and road width, translating block positions
//!   into cells

pub mod bbox;
pub mod cell;
pub mod grid;

pub use bbox::GridBox;
pub use cell::{Generation, GridCoord, PlotId, WorldName};
pub use grid::{BlockPos, CellLocation, GridLayout, PitchPart};
