//! Minimum rectangle partition of a cell set.
//!
//! Cells are unit squares and their corners are lattice points: corner
//! `(x, z)` touches cells `(x - 1, z - 1)`, `(x, z - 1)`, `(x - 1, z)` and
//! `(x, z)`. A corner with exactly three of those inside is reflex and needs
//! a cut into the region. One straight cut joining two reflex corners (a
//! chord) serves both, so the partition uses as many pairwise disjoint chords
//! as possible and one cut for every reflex corner left over:
//!
//! ```text
//!   .#.#        .A.C
//!   ####   ──►  BBBC      4 reflex corners, 2 chords: 3 boxes
//!   ...#        ...C
//! ```
//!
//! Disjoint chords are an independent set in the bipartite graph of
//! horizontal chords against the vertical chords they cross, found through a
//! maximum matching.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashSet;
use plot_grid::{GridBox, GridCoord};

/// Lattice corner, or a cell addressed by its first corner.
type Point = (i64, i64);

/// Unit edge between two edge-adjacent cells, smaller cell first.
type Wall = (Point, Point);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dir {
    Left,
    Right,
    Up,
    Down,
}

impl Dir {
    const fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// The unit edge leaving `corner` this way: the cells on either side of
    /// it and the corner it ends at.
    const fn step(self, (x, z): Point) -> (Wall, Point) {
        match self {
            Self::Right => (((x, z - 1), (x, z)), (x + 1, z)),
            Self::Left => (((x - 1, z - 1), (x - 1, z)), (x - 1, z)),
            Self::Down => (((x - 1, z), (x, z)), (x, z + 1)),
            Self::Up => (((x - 1, z - 1), (x, z - 1)), (x, z - 1)),
        }
    }
}

/// A straight cut between two reflex corners.
#[derive(Debug)]
struct Chord {
    from: Point,
    to: Point,
    walls: Vec<Wall>,
}

impl Chord {
    /// Whether this horizontal chord shares a point with a vertical one.
    fn crosses(&self, vertical: &Self) -> bool {
        let xs = self.from.0.min(self.to.0)..=self.from.0.max(self.to.0);
        let zs = vertical.from.1.min(vertical.to.1)..=vertical.from.1.max(vertical.to.1);
        xs.contains(&vertical.from.0) && zs.contains(&self.from.1)
    }
}

struct Cutter<'a> {
    cells: &'a BTreeSet<GridCoord>,
    walls: HashSet<Wall>,
}

impl Cutter<'_> {
    fn inside(&self, (x, z): Point) -> bool {
        match (i32::try_from(x), i32::try_from(z)) {
            (Ok(x), Ok(z)) => self.cells.contains(&GridCoord::new(x, z)),
            _ => false,
        }
    }

    fn interior(&self, (a, b): Wall) -> bool {
        self.inside(a) && self.inside(b)
    }

    /// Reflex corners with their two interior directions, horizontal first.
    fn reflex_corners(&self) -> BTreeMap<Point, (Dir, Dir)> {
        let mut reflex = BTreeMap::new();
        for cell in self.cells {
            let (x, z) = point(*cell);
            for corner in [(x, z), (x + 1, z), (x, z + 1), (x + 1, z + 1)] {
                if let Some(dirs) = self.reflex_dirs(corner) {
                    reflex.insert(corner, dirs);
                }
            }
        }
        reflex
    }

    fn reflex_dirs(&self, (x, z): Point) -> Option<(Dir, Dir)> {
        // The cut points away from the one missing cell on both axes
        let quadrants = [
            ((x - 1, z - 1), (Dir::Right, Dir::Down)),
            ((x, z - 1), (Dir::Left, Dir::Down)),
            ((x - 1, z), (Dir::Right, Dir::Up)),
            ((x, z), (Dir::Left, Dir::Up)),
        ];
        let mut missing = quadrants.iter().filter(|(cell, _)| !self.inside(*cell));
        let (_, dirs) = missing.next()?;
        missing.next().is_none().then_some(*dirs)
    }

    /// Whether a reflex corner already has a cut leaving it.
    fn is_split(&self, corner: Point, (h, v): (Dir, Dir)) -> bool {
        [h, v].iter().any(|dir| self.walls.contains(&dir.step(corner).0))
    }

    /// Walk from `start` while the edge ahead runs through the region,
    /// optionally stopping where an existing cut crosses the path. Returns
    /// the corner reached and the edges walked.
    fn trace(&self, start: Point, dir: Dir, stop_at_walls: bool) -> (Point, Vec<Wall>) {
        let mut at = start;
        let mut walked = Vec::new();
        loop {
            let (wall, next) = dir.step(at);
            if !self.interior(wall) {
                break;
            }
            walked.push(wall);
            at = next;
            if stop_at_walls && self.meets_wall(at, dir) {
                break;
            }
        }
        (at, walked)
    }

    fn meets_wall(&self, corner: Point, dir: Dir) -> bool {
        let across = if dir.is_horizontal() {
            [Dir::Up, Dir::Down]
        } else {
            [Dir::Left, Dir::Right]
        };
        across.iter().any(|d| self.walls.contains(&d.step(corner).0))
    }

    /// Cells grouped by the cuts, each group as its bounding box.
    fn faces(&self) -> Vec<GridBox> {
        let mut seen: HashSet<GridCoord> = HashSet::with_capacity(self.cells.len());
        let mut boxes = Vec::new();

        for &start in self.cells {
            if !seen.insert(start) {
                continue;
            }
            let mut bbox = GridBox::cell(start);
            let mut stack = vec![start];

            while let Some(cell) = stack.pop() {
                for next in cell.edge_neighbors() {
                    if self.cells.contains(&next)
                        && !self.walls.contains(&wall_between(cell, next))
                        && seen.insert(next)
                    {
                        bbox.expand(&GridBox::cell(next));
                        stack.push(next);
                    }
                }
            }
            boxes.push(bbox);
        }

        boxes
    }
}

/// Partition `cells` into as few disjoint rectangles as possible.
pub fn minimum_cover(cells: &BTreeSet<GridCoord>) -> Vec<GridBox> {
    let mut cutter = Cutter {
        cells,
        walls: HashSet::new(),
    };
    let reflex = cutter.reflex_corners();

    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    for (&corner, &(h, v)) in &reflex {
        for dir in [h, v] {
            let (end, walls) = cutter.trace(corner, dir, false);
            // Each chord is found from both ends; keep one
            if corner < end && reflex.contains_key(&end) {
                let chord = Chord {
                    from: corner,
                    to: end,
                    walls,
                };
                if dir.is_horizontal() {
                    horizontal.push(chord);
                } else {
                    vertical.push(chord);
                }
            }
        }
    }

    for chord in disjoint_chords(&horizontal, &vertical) {
        cutter.walls.extend(chord.walls.iter().copied());
    }

    for (&corner, &dirs) in &reflex {
        if !cutter.is_split(corner, dirs) {
            let (_, walls) = cutter.trace(corner, dirs.0, true);
            cutter.walls.extend(walls);
        }
    }

    cutter.faces()
}

/// Largest set of pairwise disjoint chords: everything outside a minimum
/// vertex cover of the crossing graph.
fn disjoint_chords<'c>(horizontal: &'c [Chord], vertical: &'c [Chord]) -> Vec<&'c Chord> {
    let crossing: Vec<Vec<usize>> = horizontal
        .iter()
        .map(|h| {
            vertical
                .iter()
                .enumerate()
                .filter(|(_, v)| h.crosses(v))
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let mut partner: Vec<Option<usize>> = vec![None; vertical.len()];
    for h in 0..horizontal.len() {
        let mut visited = vec![false; vertical.len()];
        augment(h, &crossing, &mut partner, &mut visited);
    }

    // Alternating reach from every unmatched horizontal chord
    let matched: HashSet<usize> = partner.iter().flatten().copied().collect();
    let mut reach_h = vec![false; horizontal.len()];
    let mut reach_v = vec![false; vertical.len()];
    let mut stack: Vec<usize> = (0..horizontal.len()).filter(|h| !matched.contains(h)).collect();
    for &h in &stack {
        reach_h[h] = true;
    }
    while let Some(h) = stack.pop() {
        for &v in &crossing[h] {
            if reach_v[v] {
                continue;
            }
            reach_v[v] = true;
            if let Some(next) = partner[v] {
                if !reach_h[next] {
                    reach_h[next] = true;
                    stack.push(next);
                }
            }
        }
    }

    horizontal
        .iter()
        .zip(&reach_h)
        .filter(|(_, reached)| **reached)
        .chain(vertical.iter().zip(&reach_v).filter(|(_, reached)| !**reached))
        .map(|(chord, _)| chord)
        .collect()
}

/// Kuhn's augmenting path step.
fn augment(
    h: usize,
    crossing: &[Vec<usize>],
    partner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &v in &crossing[h] {
        if visited[v] {
            continue;
        }
        visited[v] = true;
        let free = match partner[v] {
            None => true,
            Some(other) => augment(other, crossing, partner, visited),
        };
        if free {
            partner[v] = Some(h);
            return true;
        }
    }
    false
}

fn point(cell: GridCoord) -> Point {
    (i64::from(cell.x), i64::from(cell.z))
}

fn wall_between(a: GridCoord, b: GridCoord) -> Wall {
    let (a, b) = (point(a), point(b));
    (a.min(b), a.max(b))
}
