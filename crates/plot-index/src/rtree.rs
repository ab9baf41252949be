//! R-tree over grid boxes.
//!
//! # Structure
//!
//! ```text
//!                 ┌──────────── root (Branch) ────────────┐
//!                 │ bbox = union of children              │
//!                 └───────┬───────────────────┬───────────┘
//!                         ▼                   ▼
//!                ┌─ Branch ─┐          ┌─ Branch ─┐
//!                └──┬────┬──┘          └──┬────┬──┘
//!                   ▼    ▼                ▼    ▼
//!                 Leaf  Leaf            Leaf  Leaf     ← all at equal depth
//!              [IndexEntry; MIN..=MAX]
//! ```
//!
//! Inserts descend by least enlargement and split overflowing nodes with
//! Guttman's quadratic split. Removal dissolves nodes that fall below
//! `MIN_ENTRIES` and re-inserts their entries, so every leaf stays at the
//! same depth.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use plot_grid::{GridBox, GridCoord, PlotId};

use crate::error::{IndexError, IndexResult};

/// Maximum number of items in a node.
pub const MAX_ENTRIES: usize = 8;
/// Minimum number of items in a non-root node.
pub const MIN_ENTRIES: usize = 3;

/// One indexed rectangle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Cells covered.
    pub bbox: GridBox,
    /// Plot owning every covered cell.
    pub plot: PlotId,
}

/// Shape of the tree, for diagnostics and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Levels from root to leaf (0 for an empty index).
    pub height: usize,
    /// Total nodes.
    pub nodes: usize,
    /// Leaf nodes.
    pub leaves: usize,
    /// Indexed entries.
    pub entries: usize,
}

#[derive(Debug)]
struct Node {
    bbox: GridBox,
    kind: NodeKind,
}

#[derive(Debug)]
enum NodeKind {
    Leaf(Vec<IndexEntry>),
    Branch(Vec<Node>),
}

/// Anything with a bounding box the split can distribute.
trait Bounded {
    fn bbox(&self) -> GridBox;
}

impl Bounded for IndexEntry {
    fn bbox(&self) -> GridBox {
        self.bbox
    }
}

impl Bounded for Node {
    fn bbox(&self) -> GridBox {
        self.bbox
    }
}

fn cover<T: Bounded>(items: &[T]) -> Option<GridBox> {
    let (first, rest) = items.split_first()?;
    let mut bbox = first.bbox();
    for item in rest {
        bbox.expand(&item.bbox());
    }
    Some(bbox)
}

impl Node {
    fn leaf(entries: Vec<IndexEntry>) -> Option<Self> {
        let bbox = cover(&entries)?;
        Some(Self {
            bbox,
            kind: NodeKind::Leaf(entries),
        })
    }

    fn branch(children: Vec<Node>) -> Option<Self> {
        let bbox = cover(&children)?;
        Some(Self {
            bbox,
            kind: NodeKind::Branch(children),
        })
    }

    fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Branch(children) => children.len(),
        }
    }

    /// Recompute the box from the items. Empty nodes keep their stale box;
    /// their parent dissolves them.
    fn refresh_bbox(&mut self) {
        let bbox = match &self.kind {
            NodeKind::Leaf(entries) => cover(entries),
            NodeKind::Branch(children) => cover(children),
        };
        if let Some(bbox) = bbox {
            self.bbox = bbox;
        }
    }

    fn into_entries(self, out: &mut Vec<IndexEntry>) {
        match self.kind {
            NodeKind::Leaf(entries) => out.extend(entries),
            NodeKind::Branch(children) => {
                for child in children {
                    child.into_entries(out);
                }
            }
        }
    }

    /// Insert below this node. Returns the new sibling if this node split.
    fn insert(&mut self, entry: IndexEntry) -> Option<Node> {
        self.bbox.expand(&entry.bbox);

        match &mut self.kind {
            NodeKind::Leaf(entries) => {
                entries.push(entry);
                if entries.len() <= MAX_ENTRIES {
                    return None;
                }
                let (keep, split) = quadratic_split(std::mem::take(entries));
                *entries = keep;
                self.refresh_bbox();
                Node::leaf(split)
            }
            NodeKind::Branch(children) => {
                let best = choose_subtree(children, &entry.bbox);
                if let Some(sibling) = children[best].insert(entry) {
                    children.push(sibling);
                }
                if children.len() <= MAX_ENTRIES {
                    return None;
                }
                let (keep, split) = quadratic_split(std::mem::take(children));
                *children = keep;
                self.refresh_bbox();
                Node::branch(split)
            }
        }
    }

    /// Remove the exact entry. Underfull children are dissolved into
    /// `orphans`. Returns whether the entry was found.
    fn remove(&mut self, bbox: &GridBox, plot: &PlotId, orphans: &mut Vec<IndexEntry>) -> bool {
        let found = match &mut self.kind {
            NodeKind::Leaf(entries) => {
                match entries
                    .iter()
                    .position(|e| e.bbox == *bbox && e.plot == *plot)
                {
                    Some(pos) => {
                        entries.remove(pos);
                        true
                    }
                    None => false,
                }
            }
            NodeKind::Branch(children) => {
                let mut found = false;
                for i in 0..children.len() {
                    if !children[i].bbox.contains_box(bbox) {
                        continue;
                    }
                    if children[i].remove(bbox, plot, orphans) {
                        if children[i].len() < MIN_ENTRIES {
                            children.remove(i).into_entries(orphans);
                        }
                        found = true;
                        break;
                    }
                }
                found
            }
        };

        if found {
            self.refresh_bbox();
        }
        found
    }

    fn search<'a, B>(
        &'a self,
        bbox: &GridBox,
        visit: &mut impl FnMut(&'a IndexEntry) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        match &self.kind {
            NodeKind::Leaf(entries) => {
                for entry in entries.iter().filter(|e| e.bbox.intersects(bbox)) {
                    visit(entry)?;
                }
            }
            NodeKind::Branch(children) => {
                for child in children.iter().filter(|c| c.bbox.intersects(bbox)) {
                    child.search(bbox, visit)?;
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn stats(&self, depth: usize, stats: &mut IndexStats) {
        stats.nodes += 1;
        stats.height = stats.height.max(depth);
        match &self.kind {
            NodeKind::Leaf(entries) => {
                stats.leaves += 1;
                stats.entries += entries.len();
            }
            NodeKind::Branch(children) => {
                for child in children {
                    child.stats(depth + 1, stats);
                }
            }
        }
    }
}

/// Child needing the least enlargement to cover `bbox`.
///
/// Ties go to the smaller area, then the smaller perimeter, then the earlier
/// child.
fn choose_subtree(children: &[Node], bbox: &GridBox) -> usize {
    let mut best = 0;
    let mut best_key = (u128::MAX, u128::MAX, u128::MAX);

    for (i, child) in children.iter().enumerate() {
        let key = (
            child.bbox.enlargement(bbox),
            child.bbox.area(),
            child.bbox.perimeter(),
        );
        if key < best_key {
            best_key = key;
            best = i;
        }
    }

    best
}

/// Pair of items wasting the most area when grouped together.
fn pick_seeds<T: Bounded>(items: &[T]) -> (usize, usize) {
    let mut seeds = (0, 1);
    let mut worst = i128::MIN;

    for i in 0..items.len() {
        for j in i + 1..items.len() {
            let a = items[i].bbox();
            let b = items[j].bbox();
            let waste = a.union(&b).area() as i128 - a.area() as i128 - b.area() as i128;
            if waste > worst {
                worst = waste;
                seeds = (i, j);
            }
        }
    }

    seeds
}

/// Guttman's quadratic split into two groups of at least `MIN_ENTRIES`.
fn quadratic_split<T: Bounded>(mut items: Vec<T>) -> (Vec<T>, Vec<T>) {
    debug_assert!(items.len() > MAX_ENTRIES);

    let (i, j) = pick_seeds(&items);
    // j > i, so removing j first leaves i in place
    let second = items.remove(j);
    let first = items.remove(i);

    let mut box1 = first.bbox();
    let mut box2 = second.bbox();
    let mut group1 = vec![first];
    let mut group2 = vec![second];

    while !items.is_empty() {
        if group1.len() + items.len() == MIN_ENTRIES {
            group1.append(&mut items);
            break;
        }
        if group2.len() + items.len() == MIN_ENTRIES {
            group2.append(&mut items);
            break;
        }

        // Next: the item with the strongest preference for one group
        let mut next = 0;
        let mut strongest = 0;
        for (k, item) in items.iter().enumerate() {
            let d1 = box1.enlargement(&item.bbox());
            let d2 = box2.enlargement(&item.bbox());
            let preference = d1.abs_diff(d2);
            if k == 0 || preference > strongest {
                strongest = preference;
                next = k;
            }
        }

        let item = items.remove(next);
        let bbox = item.bbox();
        let key1 = (
            box1.enlargement(&bbox),
            box1.area(),
            box1.perimeter(),
            group1.len(),
        );
        let key2 = (
            box2.enlargement(&bbox),
            box2.area(),
            box2.perimeter(),
            group2.len(),
        );

        if key1 <= key2 {
            box1.expand(&bbox);
            group1.push(item);
        } else {
            box2.expand(&bbox);
            group2.push(item);
        }
    }

    (group1, group2)
}

/// Height-balanced R-tree mapping grid boxes to plot ids.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    root: Option<Node>,
    len: usize,
}

impl SpatialIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    /// Index `bbox` as belonging to `plot`.
    ///
    /// Fails with [`IndexError::OverlapConflict`] if the box overlaps a box
    /// of a different plot. The index never merges on its own.
    pub fn insert(&mut self, bbox: GridBox, plot: PlotId) -> IndexResult<()> {
        if let Some(existing) = self.first_overlap(&bbox, |e| e.plot != plot) {
            return Err(IndexError::OverlapConflict {
                bbox,
                existing: existing.plot.clone(),
            });
        }

        self.place(IndexEntry { bbox, plot });
        self.len += 1;
        Ok(())
    }

    /// Remove the entry for exactly `bbox` and `plot`.
    ///
    /// Fails with [`IndexError::NotFound`] when no such entry exists, even if
    /// other entries overlap the box.
    pub fn remove(&mut self, bbox: &GridBox, plot: &PlotId) -> IndexResult<()> {
        let not_found = || IndexError::NotFound {
            bbox: *bbox,
            plot: plot.clone(),
        };

        let Some(root) = self.root.as_mut() else {
            return Err(not_found());
        };
        if !root.bbox.contains_box(bbox) {
            return Err(not_found());
        }

        let mut orphans = Vec::new();
        if !root.remove(bbox, plot, &mut orphans) {
            return Err(not_found());
        }
        self.len -= 1;

        self.shrink_root();
        for entry in orphans {
            self.place(entry);
        }
        Ok(())
    }

    /// Plot owning `cell`, if any.
    #[must_use]
    pub fn query_point(&self, cell: GridCoord) -> Option<&PlotId> {
        self.first_overlap(&GridBox::cell(cell), |_| true)
            .map(|e| &e.plot)
    }

    /// Distinct plots with at least one cell inside `bbox`.
    #[must_use]
    pub fn query_range(&self, bbox: &GridBox) -> BTreeSet<PlotId> {
        let mut plots = BTreeSet::new();
        self.for_each_in(bbox, |e| {
            plots.insert(e.plot.clone());
        });
        plots
    }

    /// Entries whose box intersects `bbox`.
    #[must_use]
    pub fn entries_in(&self, bbox: &GridBox) -> Vec<&IndexEntry> {
        let mut entries = Vec::new();
        self.for_each_in(bbox, |e| entries.push(e));
        entries
    }

    /// Every entry, in tree order.
    #[must_use]
    pub fn entries(&self) -> Vec<&IndexEntry> {
        match &self.root {
            Some(root) => self.entries_in(&root.bbox),
            None => Vec::new(),
        }
    }

    /// Shape of the tree.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats::default();
        if let Some(root) = &self.root {
            root.stats(1, &mut stats);
        }
        stats
    }

    fn for_each_in<'a>(&'a self, bbox: &GridBox, mut f: impl FnMut(&'a IndexEntry)) {
        if let Some(root) = &self.root {
            let _ = root.search::<()>(bbox, &mut |e| {
                f(e);
                ControlFlow::Continue(())
            });
        }
    }

    fn first_overlap(
        &self,
        bbox: &GridBox,
        mut pred: impl FnMut(&IndexEntry) -> bool,
    ) -> Option<&IndexEntry> {
        let root = self.root.as_ref()?;
        match root.search(bbox, &mut |e| {
            if pred(e) {
                ControlFlow::Break(e)
            } else {
                ControlFlow::Continue(())
            }
        }) {
            ControlFlow::Break(e) => Some(e),
            ControlFlow::Continue(()) => None,
        }
    }

    /// Insert without the overlap check or length bookkeeping.
    fn place(&mut self, entry: IndexEntry) {
        let Some(root) = self.root.as_mut() else {
            self.root = Node::leaf(vec![entry]);
            return;
        };

        if let Some(sibling) = root.insert(entry) {
            tracing::trace!("spatial index root split");
            if let Some(old) = self.root.take() {
                self.root = Node::branch(vec![old, sibling]);
            }
        }
    }

    /// Drop empty roots and collapse single-child branches.
    fn shrink_root(&mut self) {
        loop {
            match &mut self.root {
                Some(Node {
                    kind: NodeKind::Branch(children),
                    ..
                }) if children.len() == 1 => {
                    self.root = children.pop();
                }
                Some(root) if root.len() == 0 => {
                    self.root = None;
                    return;
                }
                _ => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use plot_grid::{Generation, WorldName};

    use super::*;

    fn plot(x: i32, z: i32) -> PlotId {
        PlotId::new(WorldName::new("test"), GridCoord::new(x, z), Generation::new())
    }

    fn cell(x: i32, z: i32) -> GridBox {
        GridBox::cell(GridCoord::new(x, z))
    }

    /// Deterministic shuffle of `0..n` (n must not be a multiple of 7919).
    fn scrambled(n: usize) -> impl Iterator<Item = usize> {
        (0..n).map(move |i| (i * 7919) % n)
    }

    /// Walk the tree checking every leaf depth and node fill.
    fn assert_balanced(index: &SpatialIndex) {
        fn walk(node: &Node, depth: usize, is_root: bool, leaf_depth: &mut Option<usize>) {
            let len = node.len();
            assert!(len <= MAX_ENTRIES, "node overflow: {len}");
            if !is_root {
                assert!(len >= MIN_ENTRIES, "node underflow: {len}");
            }
            match &node.kind {
                NodeKind::Leaf(entries) => {
                    match *leaf_depth {
                        Some(d) => assert_eq!(d, depth, "leaves at different depths"),
                        None => *leaf_depth = Some(depth),
                    }
                    for e in entries {
                        assert!(node.bbox.contains_box(&e.bbox));
                    }
                }
                NodeKind::Branch(children) => {
                    for child in children {
                        assert!(node.bbox.contains_box(&child.bbox));
                        walk(child, depth + 1, false, leaf_depth);
                    }
                }
            }
        }

        if let Some(root) = &index.root {
            walk(root, 1, true, &mut None);
        }
        assert_eq!(index.stats().entries, index.len());
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::new();

        assert!(index.is_empty());
        assert_eq!(index.query_point(GridCoord::new(0, 0)), None);
        assert!(index.query_range(&cell(0, 0).inflate(10)).is_empty());
        assert_eq!(index.stats(), IndexStats::default());
    }

    #[test]
    fn test_point_queries_after_many_inserts() {
        let mut index = SpatialIndex::new();
        let n = 1000;

        for i in scrambled(n) {
            let (x, z) = ((i % 40) as i32 - 20, (i / 40) as i32 - 12);
            index.insert(cell(x, z), plot(x, z)).unwrap();
        }

        assert_eq!(index.len(), n);
        assert_balanced(&index);

        for i in 0..n {
            let (x, z) = ((i % 40) as i32 - 20, (i / 40) as i32 - 12);
            assert_eq!(index.query_point(GridCoord::new(x, z)), Some(&plot(x, z)));
        }
        assert_eq!(index.query_point(GridCoord::new(20, 0)), None);
        assert_eq!(index.query_point(GridCoord::new(0, 13)), None);
    }

    #[test]
    fn test_height_stays_logarithmic() {
        let mut index = SpatialIndex::new();
        for i in scrambled(1000) {
            let (x, z) = ((i % 40) as i32, (i / 40) as i32);
            index.insert(cell(x, z), plot(x, z)).unwrap();
        }

        // Every non-root node holds at least MIN_ENTRIES, so the height is
        // bounded by log_3(1000) plus the root.
        let stats = index.stats();
        assert!(stats.height <= 7, "height {} too large", stats.height);
        assert!(stats.leaves >= 1000 / MAX_ENTRIES);
    }

    #[test]
    fn test_overlap_conflict_leaves_index_unchanged() {
        let mut index = SpatialIndex::new();
        let big = GridBox::new(GridCoord::new(0, 0), GridCoord::new(3, 3));
        index.insert(big, plot(0, 0)).unwrap();

        let err = index.insert(cell(2, 2), plot(2, 2)).unwrap_err();
        assert_eq!(
            err,
            IndexError::OverlapConflict {
                bbox: cell(2, 2),
                existing: plot(0, 0),
            }
        );
        assert_eq!(index.len(), 1);
        assert_eq!(index.query_point(GridCoord::new(2, 2)), Some(&plot(0, 0)));

        // Boxes of the same plot may touch each other
        index.insert(cell(4, 0), plot(0, 0)).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_remove_requires_exact_match() {
        let mut index = SpatialIndex::new();
        index.insert(cell(1, 1), plot(1, 1)).unwrap();

        assert!(matches!(
            index.remove(&cell(1, 1), &plot(9, 9)),
            Err(IndexError::NotFound { .. })
        ));
        assert!(matches!(
            index.remove(&cell(1, 2), &plot(1, 1)),
            Err(IndexError::NotFound { .. })
        ));
        assert_eq!(index.len(), 1);

        index.remove(&cell(1, 1), &plot(1, 1)).unwrap();
        assert!(index.is_empty());
        assert!(matches!(
            index.remove(&cell(1, 1), &plot(1, 1)),
            Err(IndexError::NotFound { .. })
        ));
    }

    #[test]
    fn test_remove_keeps_tree_balanced() {
        let mut index = SpatialIndex::new();
        let n = 600;
        let coords = |i: usize| ((i % 30) as i32, (i / 30) as i32);

        for i in scrambled(n) {
            let (x, z) = coords(i);
            index.insert(cell(x, z), plot(x, z)).unwrap();
        }

        for i in scrambled(n).filter(|i| i % 3 != 0) {
            let (x, z) = coords(i);
            index.remove(&cell(x, z), &plot(x, z)).unwrap();
            assert_balanced(&index);
        }

        assert_eq!(index.len(), n / 3);
        for i in 0..n {
            let (x, z) = coords(i);
            let expected = (i % 3 == 0).then(|| plot(x, z));
            assert_eq!(index.query_point(GridCoord::new(x, z)), expected.as_ref());
        }

        for i in (0..n).filter(|i| i % 3 == 0) {
            let (x, z) = coords(i);
            index.remove(&cell(x, z), &plot(x, z)).unwrap();
        }
        assert!(index.is_empty());
        assert_eq!(index.stats().height, 0);
    }

    #[test]
    fn test_query_range_returns_distinct_plots() {
        let mut index = SpatialIndex::new();
        // One irregular plot stored as two boxes, plus a neighbour
        index
            .insert(GridBox::new(GridCoord::new(0, 0), GridCoord::new(1, 0)), plot(0, 0))
            .unwrap();
        index.insert(cell(0, 1), plot(0, 0)).unwrap();
        index.insert(cell(1, 1), plot(1, 1)).unwrap();
        index.insert(cell(5, 5), plot(5, 5)).unwrap();

        let hits = index.query_range(&GridBox::new(GridCoord::new(0, 0), GridCoord::new(1, 1)));
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![plot(0, 0), plot(1, 1)]);

        let entries = index.entries_in(&GridBox::new(GridCoord::new(0, 0), GridCoord::new(0, 1)));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.plot == plot(0, 0)));
        assert_eq!(index.entries().len(), 4);
    }

    #[test]
    fn test_quadratic_split_respects_min_fill() {
        let items: Vec<IndexEntry> = (0..=MAX_ENTRIES as i32)
            .map(|i| IndexEntry {
                bbox: cell(i * i, 0),
                plot: plot(i * i, 0),
            })
            .collect();

        let (a, b) = quadratic_split(items);
        assert_eq!(a.len() + b.len(), MAX_ENTRIES + 1);
        assert!(a.len() >= MIN_ENTRIES);
        assert!(b.len() >= MIN_ENTRIES);
    }
}
