//! Reconciliation planning
//!
//! Pure diff/packing logic: given the desired item set and the observed
//! partitioned state, compute the minimum set of partition edits. No I/O
//! happens here; the engine applies the plan sequentially afterwards.
//!
//! Packing order:
//!
//! 1. Partitions with scheduled removals absorb additions first, so one
//!    patch per partition carries both sides of the diff.
//! 2. Remaining additions fill the spare capacity of untouched partitions.
//! 3. Whatever is left becomes new partitions, chunked to capacity, with
//!    fresh ordinals.
//!
//! The fill length is always `min(spare capacity, pending additions)`, so no
//! planned patch or create can push a partition above capacity.

use crate::naming;
use crate::traits::{Item, Patch};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

use super::ObservedPartition;

/// A patch scheduled against one existing partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPatch {
    /// Target partition ID
    pub partition_id: String,
    /// Target partition name (for logging)
    pub partition_name: String,
    /// The append/remove pair to send
    pub patch: Patch,
}

/// A new partition to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCreate {
    /// Name with the next unused ordinal
    pub name: String,
    /// Initial items, stamped with the run start time
    pub items: Vec<Item>,
}

/// The full edit set for one reconciliation run.
///
/// Patches and creates are ordered lists; the engine applies them in this
/// exact order, one provider call at a time.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Patches against existing partitions, in observed partition order
    pub patches: Vec<PlannedPatch>,
    /// New partitions, in ordinal order
    pub creates: Vec<PlannedCreate>,
    /// Total items to add (patch appends plus created items)
    pub additions: usize,
    /// Total items to remove
    pub removals: usize,
}

/// Compute the edit set that makes the observed partitions match `desired`.
///
/// `desired` must be deduplicated by the caller; order determines which
/// items land in patched partitions and which end up in new ones. `observed`
/// is the sequential read snapshot of all managed partitions. `now` stamps
/// every appended or created item.
pub fn plan(
    desired: &[String],
    observed: &[ObservedPartition],
    capacity: usize,
    name_prefix: &str,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

    // Value -> observed partition index. An item may appear in at most one
    // managed partition; the first occurrence wins if the store disagrees.
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (partition_idx, partition) in observed.iter().enumerate() {
        for item in &partition.items {
            index.entry(item.value.as_str()).or_insert(partition_idx);
        }
    }

    // Removals grouped by partition, preserving stored order. An undesired
    // value leaves every partition holding a copy; a desired value
    // duplicated across partitions keeps only the index owner's copy.
    let mut removals: Vec<Vec<String>> = vec![Vec::new(); observed.len()];
    for (partition_idx, partition) in observed.iter().enumerate() {
        for item in &partition.items {
            let undesired = !desired_set.contains(item.value.as_str());
            let duplicate = index.get(item.value.as_str()) != Some(&partition_idx);
            if undesired || duplicate {
                removals[partition_idx].push(item.value.clone());
            }
        }
    }

    // Additions in desired order, consumed from the front.
    let mut to_add: VecDeque<&str> = desired
        .iter()
        .map(String::as_str)
        .filter(|value| !index.contains_key(*value))
        .collect();

    let mut plan = ReconcilePlan::default();
    let mut patched: Vec<bool> = vec![false; observed.len()];

    // Pass 1: co-locate additions with removals, one patch per partition.
    for (partition_idx, partition) in observed.iter().enumerate() {
        let remove = std::mem::take(&mut removals[partition_idx]);
        if remove.is_empty() {
            continue;
        }

        let occupancy_after = partition.items.len() - remove.len();
        let freed = capacity.saturating_sub(occupancy_after);
        let append = take_items(&mut to_add, freed, now);

        plan.additions += append.len();
        plan.removals += remove.len();
        patched[partition_idx] = true;
        plan.patches.push(PlannedPatch {
            partition_id: partition.id.clone(),
            partition_name: partition.name.clone(),
            patch: Patch { append, remove },
        });
    }

    // Pass 2: fill spare capacity of partitions not already scheduled.
    for (partition_idx, partition) in observed.iter().enumerate() {
        if to_add.is_empty() {
            break;
        }
        if patched[partition_idx] {
            continue;
        }

        let spare = capacity.saturating_sub(partition.items.len());
        let append = take_items(&mut to_add, spare, now);
        if append.is_empty() {
            continue;
        }

        plan.additions += append.len();
        plan.patches.push(PlannedPatch {
            partition_id: partition.id.clone(),
            partition_name: partition.name.clone(),
            patch: Patch {
                append,
                remove: Vec::new(),
            },
        });
    }

    // Pass 3: new partitions for whatever existing capacity could not hold.
    let mut ordinal = naming::next_ordinal(
        name_prefix,
        observed.iter().map(|partition| partition.name.as_str()),
    );
    while !to_add.is_empty() {
        let items = take_items(&mut to_add, capacity, now);
        plan.additions += items.len();
        plan.creates.push(PlannedCreate {
            name: naming::chunk_name(name_prefix, ordinal),
            items,
        });
        ordinal += 1;
    }

    plan
}

/// Pull up to `limit` values off the front of the queue as stamped items
fn take_items(to_add: &mut VecDeque<&str>, limit: usize, now: DateTime<Utc>) -> Vec<Item> {
    let count = limit.min(to_add.len());
    to_add
        .drain(..count)
        .map(|value| Item::with_added_at(value, now))
        .collect()
}
