//! The per-world plot table and its state transitions.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use plot_grid::{Generation, GridBox, GridCoord, PlotId, WorldName};
use plot_index::{IndexEntry, SpatialIndex};
use uuid::Uuid;

use crate::plot::entries_for;
use crate::{
    FlagPolicy, FlagSet, Plot, PlotMembers, PlotRecord, PlotRegion, TopologyError,
    TopologyResult,
};

/// Every plot of one world, kept consistent with its spatial index.
///
/// Each mutation validates first and then rewrites the index in one step. A
/// returned error means nothing changed.
#[derive(Debug)]
pub struct PlotTopology {
    world: WorldName,
    plots: HashMap<PlotId, Plot>,
    index: SpatialIndex,
    /// Last generation handed out for each home cell.
    generations: HashMap<GridCoord, Generation>,
}

impl PlotTopology {
    /// Create an empty world.
    #[must_use]
    pub fn new(world: WorldName) -> Self {
        Self {
            world,
            plots: HashMap::new(),
            index: SpatialIndex::new(),
            generations: HashMap::new(),
        }
    }

    /// World this topology manages.
    #[must_use]
    pub fn world(&self) -> &WorldName {
        &self.world
    }

    /// Number of live plots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plots.len()
    }

    /// Whether no plot is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    /// Look up a live plot.
    #[must_use]
    pub fn plot(&self, id: &PlotId) -> Option<&Plot> {
        self.plots.get(id)
    }

    /// All live plots, in no particular order.
    pub fn plots(&self) -> impl Iterator<Item = &Plot> {
        self.plots.values()
    }

    /// The spatial index backing lookups.
    #[must_use]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Plot owning `cell`, if any.
    #[must_use]
    pub fn plot_at(&self, cell: GridCoord) -> Option<&Plot> {
        self.index
            .query_point(cell)
            .and_then(|id| self.plots.get(id))
    }

    /// Plots with at least one cell inside `bbox`.
    #[must_use]
    pub fn plots_overlapping(&self, bbox: &GridBox) -> BTreeSet<PlotId> {
        self.index.query_range(bbox)
    }

    /// Plots sharing a grid edge with `id`. Empty if `id` is unknown.
    #[must_use]
    pub fn neighbors(&self, id: &PlotId) -> BTreeSet<PlotId> {
        let mut found = BTreeSet::new();
        let Some(plot) = self.plots.get(id) else {
            return found;
        };

        for bbox in plot.cover() {
            for entry in self.index.entries_in(&bbox.inflate(1)) {
                if entry.plot != *id && plot.cover().iter().any(|b| b.shares_edge(&entry.bbox)) {
                    found.insert(entry.plot.clone());
                }
            }
        }
        found
    }

    /// Whether two distinct live plots share a grid edge.
    #[must_use]
    pub fn are_adjacent(&self, a: &PlotId, b: &PlotId) -> bool {
        match (self.plots.get(a), self.plots.get(b)) {
            (Some(pa), Some(pb)) if a != b => pa.shares_edge_with(pb),
            _ => false,
        }
    }

    /// Whether `a` and `b` could be merged: distinct, adjacent and owned by
    /// the same player.
    #[must_use]
    pub fn is_same_owner_mergeable(&self, a: &PlotId, b: &PlotId) -> bool {
        match (self.plots.get(a), self.plots.get(b)) {
            (Some(pa), Some(pb)) if a != b => {
                pa.members().owner == pb.members().owner && pa.shares_edge_with(pb)
            }
            _ => false,
        }
    }

    /// Plots owned by `owner`, ordered by id.
    #[must_use]
    pub fn plots_owned_by(&self, owner: Uuid) -> Vec<&Plot> {
        let mut owned: Vec<_> = self
            .plots
            .values()
            .filter(|p| p.members().owner == owner)
            .collect();
        owned.sort_by(|a, b| a.id().cmp(b.id()));
        owned
    }

    /// Claim a free cell for `owner` as a new single-cell plot.
    pub fn claim(&mut self, cell: GridCoord, owner: Uuid) -> TopologyResult<PlotId> {
        if let Some(existing) = self.index.query_point(cell) {
            return Err(TopologyError::AlreadyClaimed {
                cell,
                plot: existing.clone(),
            });
        }

        let generation = match self.generations.get(&cell) {
            Some(last) => last
                .next()
                .ok_or(TopologyError::GenerationExhausted(cell))?,
            None => Generation::new(),
        };
        let id = PlotId::new(self.world.clone(), cell, generation);
        let plot = Plot::new(
            id.clone(),
            PlotRegion::single(cell),
            PlotMembers::new(owner),
            FlagSet::new(),
        );

        self.replace_entries(&[], &plot.index_entries())?;
        self.generations.insert(cell, generation);
        self.plots.insert(id.clone(), plot);

        tracing::debug!(plot = %id, %owner, "claimed");
        Ok(id)
    }

    /// Absorb `absorbed` into `target`.
    ///
    /// Both plots must share an edge and an owner. `absorbed` is retired,
    /// trusted members are unioned and flags are reconciled by `policy`.
    pub fn merge(
        &mut self,
        target: &PlotId,
        absorbed: &PlotId,
        policy: FlagPolicy,
    ) -> TopologyResult<()> {
        if target == absorbed {
            return Err(TopologyError::SamePlot(target.clone()));
        }
        let a = self.get(target)?;
        let b = self.get(absorbed)?;

        if a.members().owner != b.members().owner {
            return Err(TopologyError::OwnerMismatch {
                a: target.clone(),
                b: absorbed.clone(),
            });
        }
        if !a.region().touches(b.region()) {
            return Err(TopologyError::NotAdjacent {
                a: target.clone(),
                b: absorbed.clone(),
            });
        }

        let region = a.region().union(b.region());
        let components = region.component_count();
        if components != 1 {
            return Err(TopologyError::WouldDisconnect {
                plot: target.clone(),
                components,
            });
        }

        let cover = region.rectangle_cover();
        let flags = policy.reconcile(a.flags(), b.flags());
        let trusted = b.members().trusted.clone();
        let mut old = a.index_entries();
        old.extend(b.index_entries());

        self.replace_entries(&old, &entries_for(target, &cover))?;

        self.plots.remove(absorbed);
        let plot = self.get_mut(target)?;
        plot.set_region(region, cover);
        *plot.flags_mut() = flags;
        let members = plot.members_mut();
        members.trusted.extend(trusted);
        let owner = members.owner;
        members.trusted.remove(&owner);

        tracing::debug!(
            plot = %target,
            absorbed = %absorbed,
            cells = plot.region().len(),
            boxes = plot.cover().len(),
            "merged"
        );
        Ok(())
    }

    /// Remove `cells` from a plot.
    ///
    /// The remainder must stay non-empty and connected. Trimming nothing is a
    /// no-op.
    pub fn trim(&mut self, id: &PlotId, cells: &PlotRegion) -> TopologyResult<()> {
        let plot = self.get(id)?;
        if cells.is_empty() {
            return Ok(());
        }
        if let Some(cell) = cells.first_outside(plot.region()) {
            return Err(TopologyError::NotOwned {
                plot: id.clone(),
                cell,
            });
        }

        let region = plot.region().difference(cells);
        if region.is_empty() {
            return Err(TopologyError::WouldEmpty(id.clone()));
        }
        let components = region.component_count();
        if components != 1 {
            return Err(TopologyError::WouldDisconnect {
                plot: id.clone(),
                components,
            });
        }

        let cover = region.rectangle_cover();
        let old = plot.index_entries();
        self.replace_entries(&old, &entries_for(id, &cover))?;
        self.get_mut(id)?.set_region(region, cover);

        tracing::debug!(plot = %id, removed = cells.len(), "trimmed");
        Ok(())
    }

    /// Delete a plot and return its final state.
    pub fn unclaim(&mut self, id: &PlotId) -> TopologyResult<Plot> {
        let old = self.get(id)?.index_entries();
        self.replace_entries(&old, &[])?;
        let plot = self.plots.remove(id).ok_or_else(|| TopologyError::NotFound(id.clone()))?;

        tracing::debug!(plot = %id, cells = plot.region().len(), "unclaimed");
        Ok(plot)
    }

    /// Exchange the cells of two single-cell plots.
    ///
    /// Ids, members and flags stay with their plots; only the locations move.
    pub fn swap(&mut self, a: &PlotId, b: &PlotId) -> TopologyResult<()> {
        if a == b {
            return Err(TopologyError::SamePlot(a.clone()));
        }
        let pa = self.get(a)?;
        let pb = self.get(b)?;
        for plot in [pa, pb] {
            if plot.is_merged() {
                return Err(TopologyError::Merged(plot.id().clone()));
            }
        }

        let region_a = pb.region().clone();
        let region_b = pa.region().clone();
        let cover_a = region_a.rectangle_cover();
        let cover_b = region_b.rectangle_cover();

        let mut old = pa.index_entries();
        old.extend(pb.index_entries());
        let mut new = entries_for(a, &cover_a);
        new.extend(entries_for(b, &cover_b));

        self.replace_entries(&old, &new)?;
        self.get_mut(a)?.set_region(region_a, cover_a);
        self.get_mut(b)?.set_region(region_b, cover_b);

        tracing::debug!(a = %a, b = %b, "swapped");
        Ok(())
    }

    /// Set a flag, returning the previous value.
    pub fn set_flag(
        &mut self,
        id: &PlotId,
        name: &str,
        value: &str,
    ) -> TopologyResult<Option<String>> {
        let previous = self
            .get_mut(id)?
            .flags_mut()
            .insert(name.to_owned(), value.to_owned());
        tracing::trace!(plot = %id, flag = name, "flag set");
        Ok(previous)
    }

    /// Remove a flag, returning its value.
    pub fn remove_flag(&mut self, id: &PlotId, name: &str) -> TopologyResult<Option<String>> {
        let previous = self.get_mut(id)?.flags_mut().remove(name);
        tracing::trace!(plot = %id, flag = name, "flag removed");
        Ok(previous)
    }

    /// Trust a player on a plot. Returns whether they were newly added.
    pub fn add_trusted(&mut self, id: &PlotId, player: Uuid) -> TopologyResult<bool> {
        let members = self.get_mut(id)?.members_mut();
        Ok(members.owner != player && members.trusted.insert(player))
    }

    /// Revoke trust. Returns whether the player was trusted.
    pub fn remove_trusted(&mut self, id: &PlotId, player: Uuid) -> TopologyResult<bool> {
        Ok(self.get_mut(id)?.members_mut().trusted.remove(&player))
    }

    /// Transfer ownership, returning the previous owner.
    pub fn set_owner(&mut self, id: &PlotId, owner: Uuid) -> TopologyResult<Uuid> {
        let members = self.get_mut(id)?.members_mut();
        let previous = std::mem::replace(&mut members.owner, owner);
        members.trusted.remove(&owner);

        tracing::debug!(plot = %id, from = %previous, to = %owner, "owner changed");
        Ok(previous)
    }

    /// Rebuild a plot from a persisted record.
    ///
    /// The record must belong to this world, carry a fresh id and a non-empty
    /// connected region free of other plots.
    pub fn restore(&mut self, record: PlotRecord) -> TopologyResult<()> {
        let id = record.id;
        let invalid = |reason| TopologyError::InvalidRecord {
            plot: id.clone(),
            reason,
        };

        if *id.world() != self.world {
            return Err(invalid("record belongs to another world"));
        }
        if self.plots.contains_key(&id) {
            return Err(invalid("duplicate plot id"));
        }
        if record.region.is_empty() {
            return Err(invalid("empty region"));
        }
        let components = record.region.component_count();
        if components != 1 {
            return Err(TopologyError::WouldDisconnect {
                plot: id,
                components,
            });
        }
        if let Some((cell, plot)) = record
            .region
            .iter()
            .find_map(|cell| Some((cell, self.index.query_point(cell)?)))
        {
            return Err(TopologyError::AlreadyClaimed {
                cell,
                plot: plot.clone(),
            });
        }

        let plot = Plot::new(id.clone(), record.region, record.members, record.flags);
        self.replace_entries(&[], &plot.index_entries())?;

        let generation = id.generation();
        self.generations
            .entry(id.home())
            .and_modify(|g| *g = (*g).max(generation))
            .or_insert(generation);
        self.plots.insert(id.clone(), plot);

        tracing::trace!(plot = %id, "restored");
        Ok(())
    }

    /// Check that the plot table and the index agree: every plot is
    /// non-empty and connected, and every cell resolves to its own plot.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let indexed: usize = self.plots.values().map(|p| p.cover().len()).sum();
        indexed == self.index.len()
            && self.plots.iter().all(|(id, plot)| {
                plot.region().is_connected()
                    && plot
                        .region()
                        .iter()
                        .all(|cell| self.index.query_point(cell) == Some(id))
            })
    }

    fn get(&self, id: &PlotId) -> TopologyResult<&Plot> {
        self.plots
            .get(id)
            .ok_or_else(|| TopologyError::NotFound(id.clone()))
    }

    fn get_mut(&mut self, id: &PlotId) -> TopologyResult<&mut Plot> {
        self.plots
            .get_mut(id)
            .ok_or_else(|| TopologyError::NotFound(id.clone()))
    }

    /// Swap index entries all-or-nothing: on failure every entry already
    /// touched is put back.
    fn replace_entries(
        &mut self,
        remove: &[IndexEntry],
        insert: &[IndexEntry],
    ) -> TopologyResult<()> {
        for (done, entry) in remove.iter().enumerate() {
            if let Err(err) = self.index.remove(&entry.bbox, &entry.plot) {
                self.reinsert(&remove[..done]);
                return Err(err.into());
            }
        }

        for (done, entry) in insert.iter().enumerate() {
            if let Err(err) = self.index.insert(entry.bbox, entry.plot.clone()) {
                self.unplace(&insert[..done]);
                self.reinsert(remove);
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn unplace(&mut self, entries: &[IndexEntry]) {
        for entry in entries {
            if let Err(err) = self.index.remove(&entry.bbox, &entry.plot) {
                tracing::error!(%err, "failed to roll back index entry");
            }
        }
    }

    fn reinsert(&mut self, entries: &[IndexEntry]) {
        for entry in entries {
            if let Err(err) = self.index.insert(entry.bbox, entry.plot.clone()) {
                tracing::error!(%err, "failed to roll back index entry");
            }
        }
    }
}
