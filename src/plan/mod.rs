//! Work planning: the discovery products and the weighted partitioner.
//!
//! Discovery hands the planner an ordered sequence of [`WorkGroup`]s, one per
//! metadata file; [`plan`] splits them across a fixed number of worker ranks.
//! All of this is derived fresh on every invocation and consumed by the
//! runner; nothing here is persisted.

mod partition;

pub use partition::plan;

use std::path::PathBuf;

/// One target's cutout to be produced.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub targetid: i64,
    /// Right ascension, degrees
    pub ra: f64,
    /// Declination, degrees
    pub dec: f64,
    /// Where the cutout is written; its existence marks the item complete
    pub out_path: PathBuf,
    /// Source metadata file this item came from
    pub group_key: String,
}

/// The batch of [`WorkItem`]s read from one metadata file.
///
/// Weight is the remaining item count; a group whose outputs all exist
/// already has weight 0 and never occupies a plan slot.
#[derive(Debug, Clone)]
pub struct WorkGroup {
    pub source: PathBuf,
    pub items: Vec<WorkItem>,
}

impl WorkGroup {
    pub fn new(source: PathBuf, items: Vec<WorkItem>) -> Self {
        Self { source, items }
    }

    pub fn weight(&self) -> usize {
        self.items.len()
    }
}

/// The per-rank ordered sequences of WorkGroup indices produced by [`plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    ranks: Vec<Vec<usize>>,
}

impl Assignment {
    pub(crate) fn new(ranks: Vec<Vec<usize>>) -> Self {
        Self { ranks }
    }

    /// Number of ranks the plan was split across.
    pub fn size(&self) -> usize {
        self.ranks.len()
    }

    /// WorkGroup indices assigned to `rank`, cheapest group first.
    pub fn rank(&self, rank: usize) -> &[usize] {
        &self.ranks[rank]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.ranks.iter().map(Vec::as_slice)
    }

    /// Total assigned weight per rank, for logging and the plan report.
    pub fn rank_weights(&self, groups: &[WorkGroup]) -> Vec<usize> {
        self.ranks
            .iter()
            .map(|indices| indices.iter().map(|&i| groups[i].weight()).sum())
            .collect()
    }
}
