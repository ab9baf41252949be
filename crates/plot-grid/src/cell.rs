//! Grid cells and plot identities.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single grid cell within a plot world.
///
/// Ordering is row-major: by `x`, then by `z`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GridCoord {
    /// Cell X coordinate in grid-space.
    pub x: i32,
    /// Cell Z coordinate in grid-space.
    pub z: i32,
}

impl GridCoord {
    /// Create a new grid coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chebyshev distance to another cell.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        dx.max(dz)
    }

    /// Manhattan distance to another cell.
    #[must_use]
    pub fn manhattan_distance(self, other: Self) -> u64 {
        u64::from(self.x.abs_diff(other.x)) + u64::from(self.z.abs_diff(other.z))
    }

    /// Whether `other` touches this cell, diagonals included.
    #[must_use]
    pub fn is_adjacent(self, other: Self) -> bool {
        self.chebyshev_distance(other) == 1
    }

    /// Whether `other` shares a grid edge with this cell.
    #[must_use]
    pub fn shares_edge(self, other: Self) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// The four edge neighbours (-x, +x, -z, +z).
    ///
    /// Neighbours that would leave the representable range are skipped.
    pub fn edge_neighbors(self) -> impl Iterator<Item = GridCoord> {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .filter_map(move |(dx, dz)| {
                Some(Self::new(
                    self.x.checked_add(dx)?,
                    self.z.checked_add(dz)?,
                ))
            })
    }

    /// Offset by `(dx, dz)`, `None` on overflow.
    #[must_use]
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self::new(self.x.checked_add(dx)?, self.z.checked_add(dz)?))
    }
}

impl fmt::Debug for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.x, self.z)
    }
}

/// Name of a plot world. Cheap to clone.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct WorldName(Arc<str>);

impl WorldName {
    /// Create a world name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for WorldName {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&str> for WorldName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<WorldName> for String {
    fn from(name: WorldName) -> Self {
        name.0.as_ref().to_owned()
    }
}

impl fmt::Debug for WorldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for WorldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claim counter for a home cell.
///
/// Incremented each time the same home cell is claimed again, so a
/// re-claimed cell never hands out a previously retired id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u32);

impl Generation {
    /// Create a new generation (starts at 0).
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create a generation from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The following generation, or `None` once the counter is exhausted.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Get the raw generation value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Identity of a plot: its world, the cell it was claimed at, and the claim
/// generation of that cell.
///
/// A plot keeps its id however many cells it later spans. Ordering is by
/// world name, then home X, then home Z, then generation.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlotId {
    world: WorldName,
    home: GridCoord,
    generation: Generation,
}

impl PlotId {
    /// Create a plot id.
    #[must_use]
    pub const fn new(world: WorldName, home: GridCoord, generation: Generation) -> Self {
        Self {
            world,
            home,
            generation,
        }
    }

    /// World this plot lives in.
    #[must_use]
    pub const fn world(&self) -> &WorldName {
        &self.world
    }

    /// Cell the plot was claimed at.
    #[must_use]
    pub const fn home(&self) -> GridCoord {
        self.home
    }

    /// Claim generation of the home cell.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }
}

impl fmt::Debug for PlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlotId({self})")
    }
}

impl fmt::Display for PlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}v{}", self.world, self.home, self.generation.0)
    }
}
