//! Run summary reports
//!
//! Each entry point returns a summary of what it did. Reports are
//! `Serialize` so external collaborators (logging, webhook notification)
//! can ship them without re-counting.

use crate::traits::Partition;
use serde::Serialize;

/// Summary of one `synchronize` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Items added across patches and created partitions
    pub additions: usize,
    /// Items removed across patches
    pub removals: usize,
    /// Patches issued (one provider call per patched partition)
    pub patches: usize,
    /// New partitions created
    pub partitions_created: usize,
}

impl SyncReport {
    /// Whether the run found nothing to do
    pub fn is_noop(&self) -> bool {
        self.patches == 0 && self.partitions_created == 0
    }
}

/// Summary of one `defragment` run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DefragReport {
    /// Ordinal-scheme partitions that were inspected
    pub chunks: usize,
    /// Total items observed across those partitions
    pub all_entries: usize,
    /// Patches issued
    pub patches: usize,
    /// Items that moved to a different partition
    pub entries_to_move: usize,
    /// Partitions that hold at least one item after defragmentation
    pub assigned_lists: usize,
    /// Partitions left empty (deletion candidates for the caller)
    pub empty_lists: usize,
    /// Partitions still holding items, including prefix-named partitions
    /// outside the strict ordinal scheme
    pub non_empty_lists: usize,

    /// The now-empty partitions, so the caller can delete them once nothing
    /// references them anymore
    pub empty_partitions: Vec<Partition>,
    /// The partitions still in use, so the caller can rewrite downstream
    /// references before deleting the empty ones
    pub non_empty_partitions: Vec<Partition>,
}

impl DefragReport {
    /// Whether the run moved nothing
    pub fn is_noop(&self) -> bool {
        self.entries_to_move == 0
    }
}
