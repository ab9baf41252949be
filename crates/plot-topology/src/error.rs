//! Topology error types.

use plot_grid::{GridCoord, PlotId};
use plot_index::IndexError;
use thiserror::Error;

/// Topology error type.
///
/// Every mutation validates before it commits, so returning any of these
/// leaves the world exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The cell already belongs to a plot.
    #[error("cell {cell} is already claimed by {plot}")]
    AlreadyClaimed { cell: GridCoord, plot: PlotId },

    /// No live plot with this id.
    #[error("plot {0} not found")]
    NotFound(PlotId),

    /// The cell is not part of the plot.
    #[error("cell {cell} is not part of {plot}")]
    NotOwned { plot: PlotId, cell: GridCoord },

    /// The plots share no grid edge.
    #[error("{a} and {b} do not share an edge")]
    NotAdjacent { a: PlotId, b: PlotId },

    /// The change would leave the plot in several pieces.
    #[error("change would split {plot} into {components} pieces")]
    WouldDisconnect { plot: PlotId, components: usize },

    /// The trim would remove every cell.
    #[error("trim would remove every cell of {0}; unclaim it instead")]
    WouldEmpty(PlotId),

    /// The operation needs two distinct plots.
    #[error("{0} cannot be combined with itself")]
    SamePlot(PlotId),

    /// The operation only applies to single-cell plots.
    #[error("{0} is merged")]
    Merged(PlotId),

    /// The actor may not modify the plot.
    #[error("not authorized to modify {plot}")]
    Unauthorized { plot: PlotId },

    /// The plots belong to different owners.
    #[error("{a} and {b} have different owners")]
    OwnerMismatch { a: PlotId, b: PlotId },

    /// The home cell has handed out every generation.
    #[error("cell {0} has no claim generations left")]
    GenerationExhausted(GridCoord),

    /// A persisted record failed validation.
    #[error("invalid record for {plot}: {reason}")]
    InvalidRecord { plot: PlotId, reason: &'static str },

    /// The index disagrees with the plot table.
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl TopologyError {
    /// Whether this error indicates broken internal state rather than a
    /// rejected request.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

/// Result type for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;
