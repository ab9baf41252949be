//! Axis-aligned boxes of grid cells.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GridCoord;

/// An axis-aligned rectangle of grid cells. Both corners are inclusive.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridBox {
    min: GridCoord,
    max: GridCoord,
}

impl GridBox {
    /// Create the box spanned by two corners, in any order.
    #[must_use]
    pub fn new(a: GridCoord, b: GridCoord) -> Self {
        Self {
            min: GridCoord::new(a.x.min(b.x), a.z.min(b.z)),
            max: GridCoord::new(a.x.max(b.x), a.z.max(b.z)),
        }
    }

    /// A 1x1 box covering a single cell.
    #[must_use]
    pub const fn cell(cell: GridCoord) -> Self {
        Self {
            min: cell,
            max: cell,
        }
    }

    /// Smallest corner.
    #[must_use]
    pub const fn min(&self) -> GridCoord {
        self.min
    }

    /// Largest corner.
    #[must_use]
    pub const fn max(&self) -> GridCoord {
        self.max
    }

    /// Number of cells along X.
    #[must_use]
    pub fn width(&self) -> u64 {
        u64::from(self.max.x.abs_diff(self.min.x)) + 1
    }

    /// Number of cells along Z.
    #[must_use]
    pub fn depth(&self) -> u64 {
        u64::from(self.max.z.abs_diff(self.min.z)) + 1
    }

    /// Number of cells covered.
    #[must_use]
    pub fn area(&self) -> u128 {
        u128::from(self.width()) * u128::from(self.depth())
    }

    /// Perimeter in cell edges.
    #[must_use]
    pub fn perimeter(&self) -> u128 {
        2 * (u128::from(self.width()) + u128::from(self.depth()))
    }

    /// Whether the box covers `cell`.
    #[must_use]
    pub fn contains(&self, cell: GridCoord) -> bool {
        (self.min.x..=self.max.x).contains(&cell.x) && (self.min.z..=self.max.z).contains(&cell.z)
    }

    /// Whether `other` lies entirely inside this box.
    #[must_use]
    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    /// Whether the two boxes share at least one cell.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Whether two disjoint boxes share a grid edge.
    ///
    /// Boxes that only touch at a corner do not share an edge.
    #[must_use]
    pub fn shares_edge(&self, other: &Self) -> bool {
        let x_overlap = self.min.x <= other.max.x && other.min.x <= self.max.x;
        let z_overlap = self.min.z <= other.max.z && other.min.z <= self.max.z;
        let x_touch = i64::from(self.max.x) + 1 == i64::from(other.min.x)
            || i64::from(other.max.x) + 1 == i64::from(self.min.x);
        let z_touch = i64::from(self.max.z) + 1 == i64::from(other.min.z)
            || i64::from(other.max.z) + 1 == i64::from(self.min.z);

        (x_overlap && z_touch) || (z_overlap && x_touch)
    }

    /// Smallest box covering both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: GridCoord::new(self.min.x.min(other.min.x), self.min.z.min(other.min.z)),
            max: GridCoord::new(self.max.x.max(other.max.x), self.max.z.max(other.max.z)),
        }
    }

    /// Grow the box to also cover `other`.
    pub fn expand(&mut self, other: &Self) {
        *self = self.union(other);
    }

    /// Area added by growing this box to cover `other`.
    #[must_use]
    pub fn enlargement(&self, other: &Self) -> u128 {
        self.union(other).area() - self.area()
    }

    /// The box grown by `n` cells on every side, clamped to the grid.
    #[must_use]
    pub fn inflate(&self, n: i32) -> Self {
        Self {
            min: GridCoord::new(self.min.x.saturating_sub(n), self.min.z.saturating_sub(n)),
            max: GridCoord::new(self.max.x.saturating_add(n), self.max.z.saturating_add(n)),
        }
    }

    /// Iterate covered cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridCoord> {
        let Self { min, max } = *self;
        (min.x..=max.x).flat_map(move |x| (min.z..=max.z).map(move |z| GridCoord::new(x, z)))
    }
}

impl fmt::Debug for GridBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GridBox[{:?}..={:?}]", self.min, self.max)
    }
}

impl fmt::Display for GridBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.min, self.max)
    }
}
