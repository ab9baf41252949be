//! Plot regions: sets of cells with connectivity and rectangle covers.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use hashbrown::HashSet;
use plot_grid::{GridBox, GridCoord};
use serde::{Deserialize, Serialize};

use crate::cover::minimum_cover;

/// The cells owned by one plot.
///
/// Iteration is row-major, so two regions with the same cells compare and
/// serialize identically.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlotRegion {
    cells: BTreeSet<GridCoord>,
}

impl PlotRegion {
    /// Create an empty region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A region of one cell.
    #[must_use]
    pub fn single(cell: GridCoord) -> Self {
        Self {
            cells: BTreeSet::from([cell]),
        }
    }

    /// Every cell of a box.
    #[must_use]
    pub fn from_box(bbox: &GridBox) -> Self {
        bbox.cells().collect()
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the region has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether `cell` is part of the region.
    #[must_use]
    pub fn contains(&self, cell: GridCoord) -> bool {
        self.cells.contains(&cell)
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.cells.iter().copied()
    }

    /// Add a cell. Returns whether it was new.
    pub fn insert(&mut self, cell: GridCoord) -> bool {
        self.cells.insert(cell)
    }

    /// Smallest box covering every cell.
    #[must_use]
    pub fn bounding_box(&self) -> Option<GridBox> {
        let mut cells = self.iter();
        let mut bbox = GridBox::cell(cells.next()?);
        for cell in cells {
            bbox.expand(&GridBox::cell(cell));
        }
        Some(bbox)
    }

    /// Cells of either region.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            cells: self.cells.union(&other.cells).copied().collect(),
        }
    }

    /// Cells of this region not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            cells: self.cells.difference(&other.cells).copied().collect(),
        }
    }

    /// First cell of this region missing from `other`, in row-major order.
    #[must_use]
    pub fn first_outside(&self, other: &Self) -> Option<GridCoord> {
        self.cells.difference(&other.cells).next().copied()
    }

    /// Whether some cell of this region shares a grid edge with `other`.
    #[must_use]
    pub fn touches(&self, other: &Self) -> bool {
        self.iter()
            .any(|cell| cell.edge_neighbors().any(|n| other.contains(n)))
    }

    /// Region moved by `(dx, dz)`, `None` if a cell would leave the grid.
    #[must_use]
    pub fn translated(&self, dx: i32, dz: i32) -> Option<Self> {
        self.iter().map(|cell| cell.checked_offset(dx, dz)).collect()
    }

    /// Number of 4-connected components.
    ///
    /// One breadth-first pass per component; visits each cell once.
    #[must_use]
    pub fn component_count(&self) -> usize {
        let mut visited: HashSet<GridCoord> = HashSet::with_capacity(self.cells.len());
        let mut queue = VecDeque::new();
        let mut components = 0;

        for start in self.iter() {
            if !visited.insert(start) {
                continue;
            }
            components += 1;
            queue.push_back(start);

            while let Some(cell) = queue.pop_front() {
                for next in cell.edge_neighbors() {
                    if self.contains(next) && visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        components
    }

    /// Whether the region is one non-empty 4-connected component.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.component_count() == 1
    }

    /// Disjoint rectangles covering exactly the region's cells, as few as
    /// possible. A rectangular region always yields a single box.
    #[must_use]
    pub fn rectangle_cover(&self) -> Vec<GridBox> {
        minimum_cover(&self.cells)
    }
}

impl FromIterator<GridCoord> for PlotRegion {
    fn from_iter<I: IntoIterator<Item = GridCoord>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Extend<GridCoord> for PlotRegion {
    fn extend<I: IntoIterator<Item = GridCoord>>(&mut self, iter: I) {
        self.cells.extend(iter);
    }
}

impl fmt::Debug for PlotRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(&self.cells).finish()
    }
}
