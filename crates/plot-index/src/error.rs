//! Index error types.

use plot_grid::{GridBox, PlotId};
use thiserror::Error;

/// Spatial index error type.
///
/// Both variants mean the caller's view of the index disagrees with its
/// contents. The topology engine validates before touching the index, so
/// seeing one of these there indicates a bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The box overlaps a box indexed for a different plot.
    #[error("{bbox} overlaps {existing}")]
    OverlapConflict { bbox: GridBox, existing: PlotId },

    /// No entry with this exact box and plot.
    #[error("no entry {bbox} for {plot}")]
    NotFound { bbox: GridBox, plot: PlotId },
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
