//! Plots, their members and flags.

use std::collections::{BTreeMap, BTreeSet};

use plot_grid::{GridBox, PlotId};
use plot_index::IndexEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PlotRegion;

/// Flag name to value.
pub type FlagSet = BTreeMap<String, String>;

/// Who a plot belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotMembers {
    /// Owning player.
    pub owner: Uuid,
    /// Players trusted to build, besides the owner.
    #[serde(default)]
    pub trusted: BTreeSet<Uuid>,
}

impl PlotMembers {
    /// Members with only an owner.
    #[must_use]
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            trusted: BTreeSet::new(),
        }
    }

    /// Whether `actor` is the owner or trusted.
    #[must_use]
    pub fn is_member(&self, actor: Uuid) -> bool {
        self.owner == actor || self.trusted.contains(&actor)
    }
}

/// How flags are reconciled when one plot absorbs another.
#[derive(Clone, Copy, Debug, Default)]
pub enum FlagPolicy {
    /// The absorbing plot's flags win; the absorbed plot's are dropped.
    #[default]
    KeepTarget,
    /// The absorbing plot's flags win, keys only the absorbed plot has are
    /// added.
    FillMissing,
    /// The absorbed plot's flags override on conflicting keys.
    PreferAbsorbed,
    /// Caller-supplied reconciliation of `(target, absorbed)`.
    Custom(fn(&FlagSet, &FlagSet) -> FlagSet),
}

impl FlagPolicy {
    /// Flags of the merged plot.
    #[must_use]
    pub fn reconcile(self, target: &FlagSet, absorbed: &FlagSet) -> FlagSet {
        match self {
            Self::KeepTarget => target.clone(),
            Self::FillMissing => {
                let mut flags = absorbed.clone();
                flags.extend(target.iter().map(|(k, v)| (k.clone(), v.clone())));
                flags
            }
            Self::PreferAbsorbed => {
                let mut flags = target.clone();
                flags.extend(absorbed.iter().map(|(k, v)| (k.clone(), v.clone())));
                flags
            }
            Self::Custom(f) => f(target, absorbed),
        }
    }
}

/// Read-only copy of a plot, handed to persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotSnapshot {
    pub id: PlotId,
    pub region: PlotRegion,
    pub members: PlotMembers,
    #[serde(default)]
    pub flags: FlagSet,
}

/// A persisted plot, as loaded at startup.
pub type PlotRecord = PlotSnapshot;

/// A claimed plot. Owned by [`PlotTopology`](crate::PlotTopology).
///
/// Single-cell and merged plots share this type; a plot is merged when its
/// region holds more than one cell.
#[derive(Clone, Debug)]
pub struct Plot {
    id: PlotId,
    region: PlotRegion,
    members: PlotMembers,
    flags: FlagSet,
    /// Rectangles currently indexed for this plot.
    cover: Vec<GridBox>,
}

impl Plot {
    pub(crate) fn new(id: PlotId, region: PlotRegion, members: PlotMembers, flags: FlagSet) -> Self {
        let cover = region.rectangle_cover();
        Self {
            id,
            region,
            members,
            flags,
            cover,
        }
    }

    /// Plot identity.
    #[must_use]
    pub fn id(&self) -> &PlotId {
        &self.id
    }

    /// Owned cells.
    #[must_use]
    pub fn region(&self) -> &PlotRegion {
        &self.region
    }

    /// Owner and trusted players.
    #[must_use]
    pub fn members(&self) -> &PlotMembers {
        &self.members
    }

    /// Flag map.
    #[must_use]
    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    /// One flag value.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    /// Rectangles this plot is indexed under.
    #[must_use]
    pub fn cover(&self) -> &[GridBox] {
        &self.cover
    }

    /// Whether the plot spans more than one cell.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.region.len() > 1
    }

    /// Smallest box around the plot.
    #[must_use]
    pub fn bounding_box(&self) -> Option<GridBox> {
        self.region.bounding_box()
    }

    /// Whether some rectangle of this plot shares an edge with `other`'s.
    #[must_use]
    pub fn shares_edge_with(&self, other: &Plot) -> bool {
        self.cover
            .iter()
            .any(|a| other.cover.iter().any(|b| a.shares_edge(b)))
    }

    /// Read-only copy.
    #[must_use]
    pub fn snapshot(&self) -> PlotSnapshot {
        PlotSnapshot {
            id: self.id.clone(),
            region: self.region.clone(),
            members: self.members.clone(),
            flags: self.flags.clone(),
        }
    }

    pub(crate) fn index_entries(&self) -> Vec<IndexEntry> {
        entries_for(&self.id, &self.cover)
    }

    pub(crate) fn set_region(&mut self, region: PlotRegion, cover: Vec<GridBox>) {
        self.region = region;
        self.cover = cover;
    }

    pub(crate) fn members_mut(&mut self) -> &mut PlotMembers {
        &mut self.members
    }

    pub(crate) fn flags_mut(&mut self) -> &mut FlagSet {
        &mut self.flags
    }
}

pub fn entries_for(id: &PlotId, cover: &[GridBox]) -> Vec<IndexEntry> {
    cover
        .iter()
        .map(|bbox| IndexEntry {
            bbox: *bbox,
            plot: id.clone(),
        })
        .collect()
}

impl From<&Plot> for PlotSnapshot {
    fn from(plot: &Plot) -> Self {
        plot.snapshot()
    }
}
