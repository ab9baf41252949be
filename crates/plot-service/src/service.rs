//! The plot query service.

use std::collections::BTreeSet;
use std::sync::Arc;

use crossbeam_channel::Sender;
use hashbrown::HashMap;
use parking_lot::RwLock;
use plot_grid::{BlockPos, CellLocation, GridCoord, GridLayout, PitchPart, PlotId, WorldName};
use plot_topology::{FlagPolicy, PlotRegion, PlotSnapshot, PlotTopology, TopologyError};
use uuid::Uuid;

use crate::{
    Authorizer, PersistenceWorker, PlotChange, PlotStore, ServiceConfig, ServiceError,
    ServiceResult, WorldConfig,
};

struct WorldState {
    layout: GridLayout,
    topology: PlotTopology,
}

/// Outcome of loading persisted plots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub restored: usize,
    pub skipped: usize,
}

/// Which check a mutation needs.
#[derive(Clone, Copy)]
enum Access {
    Member,
    Owner,
}

/// Shared entry point for every plot operation.
///
/// All worlds live behind one read-write lock. Lookups share the read lock;
/// each mutation holds the write lock for its validate-then-commit step and
/// nothing else. Committed changes are queued for the persistence worker
/// before the lock is released, so the store sees them in commit order.
pub struct PlotService {
    worlds: RwLock<HashMap<WorldName, WorldState>>,
    authorizer: Box<dyn Authorizer>,
    changes: Option<Sender<PlotChange>>,
}

impl PlotService {
    /// A service with no worlds and no store.
    pub fn new(authorizer: impl Authorizer + 'static) -> Self {
        Self {
            worlds: RwLock::new(HashMap::new()),
            authorizer: Box::new(authorizer),
            changes: None,
        }
    }

    /// A service with every configured world registered.
    pub fn from_config(
        config: &ServiceConfig,
        authorizer: impl Authorizer + 'static,
    ) -> ServiceResult<Self> {
        config.validate()?;
        let service = Self::new(authorizer);
        for world in &config.worlds {
            service.register_world(world)?;
        }
        Ok(service)
    }

    /// Add an empty world.
    pub fn register_world(&self, config: &WorldConfig) -> ServiceResult<()> {
        let layout = config.layout()?;
        let name = WorldName::new(&config.name);

        let mut worlds = self.worlds.write();
        if worlds.contains_key(&name) {
            return Err(ServiceError::DuplicateWorld(name));
        }
        worlds.insert(
            name.clone(),
            WorldState {
                layout,
                topology: PlotTopology::new(name.clone()),
            },
        );

        tracing::debug!(
            world = %name,
            plot_size = layout.plot_size(),
            road_width = layout.road_width(),
            "world registered"
        );
        Ok(())
    }

    /// Registered worlds, sorted by name.
    pub fn worlds(&self) -> Vec<WorldName> {
        let mut names: Vec<_> = self.worlds.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Layout of a world.
    pub fn layout(&self, world: &WorldName) -> ServiceResult<GridLayout> {
        self.read(world, |state| state.layout)
    }

    /// Rebuild plots from a store's records.
    ///
    /// Records for unknown worlds or that fail validation are skipped and
    /// logged; only a failure of the store itself is an error.
    pub fn load_from(&self, store: &dyn PlotStore) -> eyre::Result<LoadSummary> {
        let records = store.load_all_plots()?;
        let mut summary = LoadSummary::default();

        let mut worlds = self.worlds.write();
        for record in records {
            let id = record.id.clone();
            let Some(state) = worlds.get_mut(id.world()) else {
                tracing::warn!(plot = %id, "skipping plot record for unknown world");
                summary.skipped += 1;
                continue;
            };
            match state.topology.restore(record) {
                Ok(()) => summary.restored += 1,
                Err(err) => {
                    tracing::warn!(plot = %id, error = %err, "skipping invalid plot record");
                    summary.skipped += 1;
                }
            }
        }

        tracing::debug!(restored = summary.restored, skipped = summary.skipped, "plots loaded");
        Ok(summary)
    }

    /// Load from `store`, then send every later change to it on a
    /// background worker.
    pub fn attach_store(
        &mut self,
        store: Arc<dyn PlotStore>,
    ) -> eyre::Result<(LoadSummary, PersistenceWorker)> {
        let summary = self.load_from(&*store)?;
        let (tx, worker) = PersistenceWorker::spawn(store)?;
        self.changes = Some(tx);
        Ok((summary, worker))
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Claim a cell for `owner`.
    pub fn claim(&self, world: &WorldName, cell: GridCoord, owner: Uuid) -> ServiceResult<PlotId> {
        self.write(world, |state| claim_cell(state, cell, owner))
    }

    /// Claim the cell containing a block. Fails with [`ServiceError::Road`]
    /// on a road.
    pub fn claim_at(&self, world: &WorldName, pos: BlockPos, owner: Uuid) -> ServiceResult<PlotId> {
        self.write(world, |state| match state.layout.locate(pos) {
            CellLocation::Plot(cell) => claim_cell(state, cell, owner),
            CellLocation::Road(_) => Err(ServiceError::Road(pos)),
        })
    }

    /// Absorb `absorbed` into `target`. `actor` must be authorized on both.
    pub fn merge(
        &self,
        actor: Uuid,
        target: &PlotId,
        absorbed: &PlotId,
        policy: FlagPolicy,
    ) -> ServiceResult<()> {
        self.write(target.world(), |state| {
            self.authorize(&state.topology, target, actor, Access::Member)?;
            self.authorize(&state.topology, absorbed, actor, Access::Member)?;
            state.topology.merge(target, absorbed, policy)?;

            let changes = vec![
                updated(&state.topology, target)?,
                PlotChange::retired(absorbed.clone()),
            ];
            Ok(((), changes))
        })
    }

    /// Remove cells from a plot.
    pub fn trim(&self, actor: Uuid, id: &PlotId, cells: &PlotRegion) -> ServiceResult<()> {
        self.write(id.world(), |state| {
            self.authorize(&state.topology, id, actor, Access::Member)?;
            state.topology.trim(id, cells)?;

            let changes = if cells.is_empty() {
                Vec::new()
            } else {
                vec![updated(&state.topology, id)?]
            };
            Ok(((), changes))
        })
    }

    /// Delete a plot, returning its final state.
    pub fn unclaim(&self, actor: Uuid, id: &PlotId) -> ServiceResult<PlotSnapshot> {
        self.write(id.world(), |state| {
            self.authorize(&state.topology, id, actor, Access::Member)?;
            let plot = state.topology.unclaim(id)?;
            Ok((plot.snapshot(), vec![PlotChange::retired(id.clone())]))
        })
    }

    /// Exchange the locations of two single-cell plots.
    pub fn swap(&self, actor: Uuid, a: &PlotId, b: &PlotId) -> ServiceResult<()> {
        self.write(a.world(), |state| {
            self.authorize(&state.topology, a, actor, Access::Member)?;
            self.authorize(&state.topology, b, actor, Access::Member)?;
            state.topology.swap(a, b)?;

            let changes = vec![updated(&state.topology, a)?, updated(&state.topology, b)?];
            Ok(((), changes))
        })
    }

    /// Set a flag, returning the previous value.
    pub fn set_flag(
        &self,
        actor: Uuid,
        id: &PlotId,
        name: &str,
        value: &str,
    ) -> ServiceResult<Option<String>> {
        self.write(id.world(), |state| {
            self.authorize(&state.topology, id, actor, Access::Member)?;
            let previous = state.topology.set_flag(id, name, value)?;
            Ok((previous, vec![updated(&state.topology, id)?]))
        })
    }

    /// Remove a flag, returning its value.
    pub fn remove_flag(&self, actor: Uuid, id: &PlotId, name: &str) -> ServiceResult<Option<String>> {
        self.write(id.world(), |state| {
            self.authorize(&state.topology, id, actor, Access::Member)?;
            let previous = state.topology.remove_flag(id, name)?;
            let changes = match previous {
                Some(_) => vec![updated(&state.topology, id)?],
                None => Vec::new(),
            };
            Ok((previous, changes))
        })
    }

    /// Trust a player. Only the owner may do this.
    pub fn add_trusted(&self, actor: Uuid, id: &PlotId, player: Uuid) -> ServiceResult<bool> {
        self.write(id.world(), |state| {
            self.authorize(&state.topology, id, actor, Access::Owner)?;
            let added = state.topology.add_trusted(id, player)?;
            Ok((added, changed_if(added, &state.topology, id)?))
        })
    }

    /// Revoke trust. Only the owner may do this.
    pub fn remove_trusted(&self, actor: Uuid, id: &PlotId, player: Uuid) -> ServiceResult<bool> {
        self.write(id.world(), |state| {
            self.authorize(&state.topology, id, actor, Access::Owner)?;
            let removed = state.topology.remove_trusted(id, player)?;
            Ok((removed, changed_if(removed, &state.topology, id)?))
        })
    }

    /// Hand a plot to a new owner, returning the previous one.
    pub fn set_owner(&self, actor: Uuid, id: &PlotId, owner: Uuid) -> ServiceResult<Uuid> {
        self.write(id.world(), |state| {
            self.authorize(&state.topology, id, actor, Access::Owner)?;
            let previous = state.topology.set_owner(id, owner)?;
            Ok((previous, vec![updated(&state.topology, id)?]))
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Plot at a block position.
    ///
    /// A road position belongs to a plot only when every cell the road
    /// separates is part of that plot.
    pub fn plot_at(&self, world: &WorldName, pos: BlockPos) -> ServiceResult<Option<PlotId>> {
        self.read(world, |state| {
            let index = state.topology.index();
            match state.layout.locate(pos) {
                CellLocation::Plot(cell) => index.query_point(cell).cloned(),
                CellLocation::Road(cells) => {
                    let mut owners = cells.iter().map(|cell| index.query_point(*cell));
                    let first = owners.next().flatten()?;
                    owners.all(|o| o == Some(first)).then(|| first.clone())
                }
            }
        })
    }

    /// Plot owning a grid cell.
    pub fn plot_at_cell(&self, world: &WorldName, cell: GridCoord) -> ServiceResult<Option<PlotId>> {
        self.read(world, |state| state.topology.index().query_point(cell).cloned())
    }

    /// Plots owning at least one block of the box spanned by `a` and `b`.
    ///
    /// Road blocks count under the same rule as [`Self::plot_at`], so a box
    /// lying entirely on a road only reports a plot that spans that road.
    pub fn plots_overlapping(
        &self,
        world: &WorldName,
        a: BlockPos,
        b: BlockPos,
    ) -> ServiceResult<BTreeSet<PlotId>> {
        self.read(world, |state| {
            let layout = &state.layout;
            let pitches = layout.grid_box(a, b);
            let mut hits = state.topology.plots_overlapping(&pitches);
            hits.retain(|id| {
                state.topology.plot(id).is_some_and(|plot| {
                    let region = plot.region();
                    region
                        .iter()
                        .filter(|cell| pitches.contains(*cell))
                        .any(|cell| {
                            owned_parts(region, cell)
                                .any(|part| layout.part_intersects(cell, part, a, b))
                        })
                })
            });
            hits
        })
    }

    /// Plots sharing a grid edge with `id`.
    pub fn neighbors_of(&self, id: &PlotId) -> ServiceResult<BTreeSet<PlotId>> {
        self.read(id.world(), |state| state.topology.neighbors(id))
    }

    /// Whether `a` and `b` are distinct adjacent plots of one owner.
    pub fn is_same_owner_mergeable(&self, a: &PlotId, b: &PlotId) -> bool {
        a.world() == b.world()
            && self
                .read(a.world(), |state| state.topology.is_same_owner_mergeable(a, b))
                .unwrap_or(false)
    }

    /// Current state of a plot.
    pub fn snapshot(&self, id: &PlotId) -> Option<PlotSnapshot> {
        self.read(id.world(), |state| state.topology.plot(id).map(|p| p.snapshot()))
            .ok()
            .flatten()
    }

    /// Ids of a world's plots owned by `owner`.
    pub fn plots_owned_by(&self, world: &WorldName, owner: Uuid) -> ServiceResult<Vec<PlotId>> {
        self.read(world, |state| {
            state
                .topology
                .plots_owned_by(owner)
                .into_iter()
                .map(|p| p.id().clone())
                .collect()
        })
    }

    /// Number of plots in a world.
    pub fn plot_count(&self, world: &WorldName) -> ServiceResult<usize> {
        self.read(world, |state| state.topology.len())
    }

    /// Whether a world's plot table and index agree.
    pub fn is_consistent(&self, world: &WorldName) -> ServiceResult<bool> {
        self.read(world, |state| state.topology.is_consistent())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn read<T>(&self, world: &WorldName, f: impl FnOnce(&WorldState) -> T) -> ServiceResult<T> {
        let worlds = self.worlds.read();
        let state = worlds
            .get(world)
            .ok_or_else(|| ServiceError::UnknownWorld(world.clone()))?;
        Ok(f(state))
    }

    fn write<T>(
        &self,
        world: &WorldName,
        f: impl FnOnce(&mut WorldState) -> ServiceResult<(T, Vec<PlotChange>)>,
    ) -> ServiceResult<T> {
        let mut worlds = self.worlds.write();
        let state = worlds
            .get_mut(world)
            .ok_or_else(|| ServiceError::UnknownWorld(world.clone()))?;
        let (value, changes) = f(state)?;
        // Sent under the guard so the channel sees commit order
        self.notify(changes);
        Ok(value)
    }

    fn notify(&self, changes: Vec<PlotChange>) {
        let Some(tx) = &self.changes else {
            return;
        };
        for change in changes {
            if let Err(err) = tx.send(change) {
                tracing::warn!(plot = %err.0.id, "persistence worker gone, change dropped");
            }
        }
    }

    fn authorize(
        &self,
        topology: &PlotTopology,
        id: &PlotId,
        actor: Uuid,
        access: Access,
    ) -> ServiceResult<()> {
        let plot = topology
            .plot(id)
            .ok_or_else(|| TopologyError::NotFound(id.clone()))?;
        let allowed = match access {
            Access::Member => self.authorizer.is_owner_or_trusted(id, plot.members(), actor),
            Access::Owner => self.authorizer.is_owner(id, plot.members(), actor),
        };
        if allowed {
            Ok(())
        } else {
            Err(TopologyError::Unauthorized { plot: id.clone() }.into())
        }
    }
}

fn claim_cell(
    state: &mut WorldState,
    cell: GridCoord,
    owner: Uuid,
) -> ServiceResult<(PlotId, Vec<PlotChange>)> {
    let id = state.topology.claim(cell, owner)?;
    let change = updated(&state.topology, &id)?;
    Ok((id, vec![change]))
}

fn updated(topology: &PlotTopology, id: &PlotId) -> ServiceResult<PlotChange> {
    let plot = topology
        .plot(id)
        .ok_or_else(|| TopologyError::NotFound(id.clone()))?;
    Ok(PlotChange::updated(plot.snapshot()))
}

fn changed_if(
    changed: bool,
    topology: &PlotTopology,
    id: &PlotId,
) -> ServiceResult<Vec<PlotChange>> {
    if changed {
        Ok(vec![updated(topology, id)?])
    } else {
        Ok(Vec::new())
    }
}

/// Parts of `cell`'s pitch a plot holding `region` owns. A road strip
/// belongs to the plot only when the plot also holds every cell it separates.
fn owned_parts(region: &PlotRegion, cell: GridCoord) -> impl Iterator<Item = PitchPart> {
    let holds = |dx, dz| cell.checked_offset(dx, dz).is_some_and(|c| region.contains(c));
    let east = holds(1, 0);
    let south = holds(0, 1);
    let crossing = east && south && holds(1, 1);

    [
        (PitchPart::Plot, true),
        (PitchPart::EastRoad, east),
        (PitchPart::SouthRoad, south),
        (PitchPart::Crossing, crossing),
    ]
    .into_iter()
    .filter_map(|(part, owned)| owned.then_some(part))
}
