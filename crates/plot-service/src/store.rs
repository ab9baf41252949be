//! Persistence seam.
//!
//! The core owns no file or database format. It loads every record once at
//! startup and afterwards pushes committed changes to a [`PlotStore`] on a
//! background thread:
//!
//! ```text
//!   mutation ──commit──► channel ──► worker thread ──► PlotStore
//!   (write lock)         (unbounded)
//! ```
//!
//! A slow or failing store never delays or fails a mutation.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use plot_grid::PlotId;
use plot_topology::{PlotRecord, PlotSnapshot};

/// External storage for plot records.
pub trait PlotStore: Send + Sync {
    /// Every persisted plot. Called once at startup.
    fn load_all_plots(&self) -> eyre::Result<Vec<PlotRecord>>;

    /// A plot changed. `None` means the id was retired.
    fn on_plot_changed(&self, id: &PlotId, snapshot: Option<&PlotSnapshot>) -> eyre::Result<()>;
}

/// One committed change, queued for the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlotChange {
    pub id: PlotId,
    pub snapshot: Option<PlotSnapshot>,
}

impl PlotChange {
    pub(crate) fn updated(snapshot: PlotSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            snapshot: Some(snapshot),
        }
    }

    pub(crate) fn retired(id: PlotId) -> Self {
        Self { id, snapshot: None }
    }
}

/// Background thread draining the change queue into a store.
#[derive(Debug)]
pub struct PersistenceWorker {
    handle: JoinHandle<usize>,
}

impl PersistenceWorker {
    /// Start the worker. Returns the sending half of its queue.
    pub fn spawn(store: Arc<dyn PlotStore>) -> eyre::Result<(Sender<PlotChange>, Self)> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("plot-persistence".to_owned())
            .spawn(move || drain(&*store, &rx))?;
        Ok((tx, Self { handle }))
    }

    /// Wait until every sender is dropped and the queue is empty. Returns
    /// how many changes were handed to the store.
    pub fn join(self) -> eyre::Result<usize> {
        self.handle
            .join()
            .map_err(|_| eyre::eyre!("persistence worker panicked"))
    }
}

fn drain(store: &dyn PlotStore, rx: &Receiver<PlotChange>) -> usize {
    let mut delivered = 0;
    for change in rx {
        delivered += 1;
        if let Err(err) = store.on_plot_changed(&change.id, change.snapshot.as_ref()) {
            tracing::warn!(plot = %change.id, error = %err, "failed to persist plot change");
        }
    }
    tracing::debug!(delivered, "persistence worker stopped");
    delivered
}
