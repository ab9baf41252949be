//! Authorization seam.
//!
//! The service never reads permission data itself. Before any mutation of
//! an existing plot it asks an [`Authorizer`].

use hashbrown::HashSet;
use plot_grid::PlotId;
use plot_topology::PlotMembers;
use uuid::Uuid;

/// Decides whether an actor may modify a plot.
pub trait Authorizer: Send + Sync {
    /// Whether `actor` may build on and reshape the plot.
    fn is_owner_or_trusted(&self, plot: &PlotId, members: &PlotMembers, actor: Uuid) -> bool;

    /// Whether `actor` may manage the plot's members.
    fn is_owner(&self, _plot: &PlotId, members: &PlotMembers, actor: Uuid) -> bool {
        members.owner == actor
    }
}

/// Authorizes owners, trusted members and a fixed set of admins.
#[derive(Clone, Debug, Default)]
pub struct MembershipAuthorizer {
    admins: HashSet<Uuid>,
}

impl MembershipAuthorizer {
    /// No admins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admins may modify any plot.
    #[must_use]
    pub fn with_admins(admins: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Whether `actor` bypasses membership checks.
    #[must_use]
    pub fn is_admin(&self, actor: Uuid) -> bool {
        self.admins.contains(&actor)
    }
}

impl Authorizer for MembershipAuthorizer {
    fn is_owner_or_trusted(&self, _plot: &PlotId, members: &PlotMembers, actor: Uuid) -> bool {
        self.is_admin(actor) || members.is_member(actor)
    }

    fn is_owner(&self, _plot: &PlotId, members: &PlotMembers, actor: Uuid) -> bool {
        self.is_admin(actor) || members.owner == actor
    }
}

#[cfg(test)]
mod tests {
    use plot_grid::{Generation, GridCoord, WorldName};

    use super::*;

    #[test]
    fn test_membership_and_admins() {
        let owner = Uuid::from_u128(1);
        let friend = Uuid::from_u128(2);
        let admin = Uuid::from_u128(3);
        let id = PlotId::new(WorldName::new("w"), GridCoord::new(0, 0), Generation::new());
        let mut members = PlotMembers::new(owner);
        members.trusted.insert(friend);

        let auth = MembershipAuthorizer::with_admins([admin]);
        assert!(auth.is_owner_or_trusted(&id, &members, friend));
        assert!(!auth.is_owner(&id, &members, friend));
        assert!(auth.is_owner(&id, &members, admin));
        assert!(!MembershipAuthorizer::new().is_owner_or_trusted(&id, &members, admin));
    }
}
