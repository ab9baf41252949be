//! Plot world layout: translating block positions into grid cells.
//!
//! A plot world is tiled by a square pitch of `plot_size + road_width`
//! blocks. The first `plot_size` blocks of each pitch on both axes belong to
//! the cell, the rest is road:
//!
//! ```text
//!   |<- plot_size ->|<- road ->|<- plot_size ->|
//!   +---------------+##########+---------------+
//!   |    (0, 0)     |##########|    (1, 0)     |
//!   +---------------+##########+---------------+
//!   ################################################
//!   +---------------+##########+---------------+
//!   |    (0, 1)     |##########|    (1, 1)     |
//! ```

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{GridBox, GridCoord};

/// A block column in world space. Height is irrelevant to plot lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub z: i32,
}

impl BlockPos {
    /// Create a new block position.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Block column containing a floating-point world position.
    ///
    /// Returns `None` for non-finite or out-of-range coordinates.
    #[must_use]
    pub fn from_position(x: f64, z: f64) -> Option<Self> {
        Some(Self::new(floor_block(x)?, floor_block(z)?))
    }
}

fn floor_block(v: f64) -> Option<i32> {
    let floored = v.floor();
    if floored.is_finite() && floored >= f64::from(i32::MIN) && floored <= f64::from(i32::MAX) {
        Some(floored as i32)
    } else {
        None
    }
}

/// Where a block column falls on the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellLocation {
    /// Inside a plot cell.
    Plot(GridCoord),
    /// On a road. Lists the cells the road separates: two for a road
    /// between cells, four for an intersection.
    Road(SmallVec<[GridCoord; 4]>),
}

/// One piece of a cell's pitch.
///
/// Every pitch holds its plot area plus the road strips on its east (+x) and
/// south (+z) side and the crossing where those two meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PitchPart {
    Plot,
    EastRoad,
    SouthRoad,
    Crossing,
}

/// Axis position relative to the grid.
#[derive(Clone, Copy)]
enum Axis {
    Cell(i32),
    /// Road after this cell index.
    Road(i32),
}

impl Axis {
    fn cells(self) -> SmallVec<[i32; 2]> {
        match self {
            // pitch >= 2 whenever roads exist, so `i + 1` stays in range
            Self::Road(i) => SmallVec::from_slice(&[i, i + 1]),
            Self::Cell(i) => SmallVec::from_slice(&[i]),
        }
    }
}

/// Fixed geometry of a plot world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridLayout {
    plot_size: u32,
    road_width: u32,
}

impl GridLayout {
    /// Create a layout. Returns `None` if `plot_size` is zero or the pitch
    /// does not fit in a block coordinate.
    #[must_use]
    pub fn new(plot_size: u32, road_width: u32) -> Option<Self> {
        let pitch = u64::from(plot_size) + u64::from(road_width);
        if plot_size == 0 || pitch > i32::MAX as u64 {
            return None;
        }
        Some(Self {
            plot_size,
            road_width,
        })
    }

    /// Plot edge length in blocks.
    #[must_use]
    pub const fn plot_size(&self) -> u32 {
        self.plot_size
    }

    /// Road width in blocks.
    #[must_use]
    pub const fn road_width(&self) -> u32 {
        self.road_width
    }

    /// Distance between the origins of neighbouring cells.
    #[must_use]
    pub fn pitch(&self) -> i64 {
        i64::from(self.plot_size) + i64::from(self.road_width)
    }

    fn axis(&self, v: i32) -> Axis {
        let pitch = self.pitch();
        let index = i64::from(v).div_euclid(pitch) as i32;
        if i64::from(v).rem_euclid(pitch) < i64::from(self.plot_size) {
            Axis::Cell(index)
        } else {
            Axis::Road(index)
        }
    }

    /// Locate a block column on the grid.
    #[must_use]
    pub fn locate(&self, pos: BlockPos) -> CellLocation {
        match (self.axis(pos.x), self.axis(pos.z)) {
            (Axis::Cell(x), Axis::Cell(z)) => CellLocation::Plot(GridCoord::new(x, z)),
            (ax, az) => {
                let mut cells = SmallVec::new();
                for x in ax.cells() {
                    for z in az.cells() {
                        cells.push(GridCoord::new(x, z));
                    }
                }
                CellLocation::Road(cells)
            }
        }
    }

    /// Cell whose pitch contains the block, road included.
    #[must_use]
    pub fn cell_of(&self, pos: BlockPos) -> GridCoord {
        let pitch = self.pitch();
        GridCoord::new(
            i64::from(pos.x).div_euclid(pitch) as i32,
            i64::from(pos.z).div_euclid(pitch) as i32,
        )
    }

    /// Every cell whose pitch intersects the block box spanned by `a` and `b`.
    #[must_use]
    pub fn grid_box(&self, a: BlockPos, b: BlockPos) -> GridBox {
        GridBox::new(self.cell_of(a), self.cell_of(b))
    }

    /// Whether a part of `cell`'s pitch shares a block with the box spanned
    /// by `a` and `b`. Always false for road parts of a roadless layout.
    #[must_use]
    pub fn part_intersects(
        &self,
        cell: GridCoord,
        part: PitchPart,
        a: BlockPos,
        b: BlockPos,
    ) -> bool {
        let pitch = self.pitch();
        let size = i64::from(self.plot_size);
        let span = |index: i32, road: bool| {
            let origin = i64::from(index) * pitch;
            if road {
                (origin + size, origin + pitch - 1)
            } else {
                (origin, origin + size - 1)
            }
        };

        let (east, south) = match part {
            PitchPart::Plot => (false, false),
            PitchPart::EastRoad => (true, false),
            PitchPart::SouthRoad => (false, true),
            PitchPart::Crossing => (true, true),
        };
        overlaps(span(cell.x, east), ordered(a.x, b.x))
            && overlaps(span(cell.z, south), ordered(a.z, b.z))
    }

    /// First block of a cell, `None` if it lies outside block space.
    #[must_use]
    pub fn cell_origin(&self, cell: GridCoord) -> Option<BlockPos> {
        let pitch = self.pitch();
        let x = i32::try_from(i64::from(cell.x) * pitch).ok()?;
        let z = i32::try_from(i64::from(cell.z) * pitch).ok()?;
        Some(BlockPos::new(x, z))
    }
}

fn ordered(a: i32, b: i32) -> (i64, i64) {
    (i64::from(a.min(b)), i64::from(a.max(b)))
}

/// Whether the inclusive spans share a value. An empty span (`lo > hi`)
/// overlaps nothing.
const fn overlaps((lo, hi): (i64, i64), (from, to): (i64, i64)) -> bool {
    lo <= hi && lo <= to && from <= hi
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            plot_size: 42,
            road_width: 7,
        }
    }
}
