//! Defragmentation planning
//!
//! Re-sorts the full cross-partition item collection by age and reassigns
//! items to partitions in ordinal order, front-packed: stable, long-lived
//! items concentrate in the early partitions and churn concentrates in a
//! small tail. Pure logic; the engine applies the resulting patches.
//!
//! The total order is (timestamp ascending, value ascending). Items without
//! a stored timestamp get the single run-start timestamp, so repeated runs
//! with unchanged input produce identical assignments and the second run is
//! a no-op. Anything weaker would make partitions flip-flop between runs.

use crate::error::{Error, Result};
use crate::traits::{Item, Partition, Patch};
use chrono::{DateTime, Utc};

use super::ObservedPartition;
use super::reconcile::PlannedPatch;

/// The move set for one defragmentation run
#[derive(Debug, Clone, Default)]
pub struct DefragPlan {
    /// Patches in ordinal order, one per partition that gains or loses items
    pub patches: Vec<PlannedPatch>,
    /// Total items observed
    pub all_entries: usize,
    /// Items assigned to a partition other than their origin
    pub entries_to_move: usize,
    /// Partitions holding at least one item after the moves
    pub non_empty: Vec<Partition>,
    /// Partitions left with zero items (deletion candidates)
    pub empty: Vec<Partition>,
}

/// Compute the canonical oldest-first, front-packed assignment.
///
/// `observed` must be the ordinal-scheme partitions sorted by ordinal
/// ascending; `run_start` substitutes for missing timestamps, sampled once
/// for the whole run.
///
/// Fails with a fatal invariant violation if the items would need more
/// partitions than exist. Defragmentation only reshuffles, so that can only
/// happen when the read-then-patch window was violated by concurrent
/// external mutation.
pub fn plan(
    observed: &[ObservedPartition],
    capacity: usize,
    run_start: DateTime<Utc>,
) -> Result<DefragPlan> {
    struct Entry<'a> {
        value: &'a str,
        timestamp: DateTime<Utc>,
        origin: usize,
    }

    let mut entries: Vec<Entry<'_>> = Vec::new();
    for (partition_idx, partition) in observed.iter().enumerate() {
        for item in &partition.items {
            entries.push(Entry {
                value: item.value.as_str(),
                timestamp: item.added_at.unwrap_or(run_start),
                origin: partition_idx,
            });
        }
    }

    // Oldest first; exact-timestamp ties break on the value so the order is
    // independent of partition read order.
    entries.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.value.cmp(b.value))
    });

    let mut patches: Vec<Patch> = vec![Patch::default(); observed.len()];
    let mut assigned_counts: Vec<usize> = vec![0; observed.len()];
    let mut entries_to_move = 0;

    for (position, entry) in entries.iter().enumerate() {
        let target = position / capacity;
        if target >= observed.len() {
            return Err(Error::invariant(format!(
                "{} items need {} partitions of capacity {}, but only {} exist; \
                 the partition set changed mid-run",
                entries.len(),
                entries.len().div_ceil(capacity),
                capacity,
                observed.len(),
            )));
        }

        assigned_counts[target] += 1;
        if entry.origin != target {
            entries_to_move += 1;
            patches[entry.origin].remove.push(entry.value.to_string());
            patches[target]
                .append
                .push(Item::with_added_at(entry.value, entry.timestamp));
        }
    }

    let mut plan = DefragPlan {
        all_entries: entries.len(),
        entries_to_move,
        ..DefragPlan::default()
    };

    for (partition_idx, patch) in patches.into_iter().enumerate() {
        let partition = Partition {
            id: observed[partition_idx].id.clone(),
            name: observed[partition_idx].name.clone(),
        };

        if assigned_counts[partition_idx] > 0 {
            plan.non_empty.push(partition.clone());
        } else {
            plan.empty.push(partition.clone());
        }

        if !patch.is_empty() {
            plan.patches.push(PlannedPatch {
                partition_id: partition.id,
                partition_name: partition.name,
                patch,
            });
        }
    }

    Ok(plan)
}
