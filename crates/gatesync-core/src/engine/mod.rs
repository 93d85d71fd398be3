//! Core synchronization engine
//!
//! The SyncEngine is responsible for:
//! - Reading the observed partitioned state through a PartitionStore
//! - Planning the minimal edit set (reconciliation or defragmentation)
//! - Applying patches sequentially through the retrying request executor
//! - Emitting events and returning a run summary
//!
//! ## Architecture
//!
//! ```text
//!  desired items ──► SyncEngine ──► reconcile::plan ─┐
//!                        │                           │ ordered patches
//!  (periodic)   ──►      │     ──► defrag::plan    ──┤ and creates
//!                        ▼                           ▼
//!                  retry executor ──────────► PartitionStore
//! ```
//!
//! ## Sequencing
//!
//! Every remote call is awaited sequentially. The provider rate limit is
//! shared, so no two mutating calls are ever in flight at once, and no two
//! runs may execute concurrently against the same managed partition set:
//! both entry points compute a point-in-time index and patch against it.
//! External scheduling must serialize invocations. There is no mid-run
//! cancellation; already-applied patches stay committed and the next run
//! reconverges from fresh reads.

pub mod defrag;
pub mod reconcile;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::naming;
use crate::report::{DefragReport, SyncReport};
use crate::retry::{self, RetryPolicy};
use crate::traits::{Item, Partition, PartitionStore};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One partition's read snapshot: metadata plus the items observed this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPartition {
    /// The store-assigned partition ID
    pub id: String,
    /// The partition name
    pub name: String,
    /// The items observed (up to one page)
    pub items: Vec<Item>,
}

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A patch was applied to one partition
    PatchApplied {
        partition_id: String,
        partition_name: String,
        appended: usize,
        removed: usize,
    },

    /// A new partition was created
    PartitionCreated { name: String, items: usize },

    /// An emptied partition was deleted
    PartitionDeleted {
        partition_id: String,
        partition_name: String,
    },

    /// A store operation spent its whole retry budget.
    ///
    /// Consumers should treat this as the trigger for an out-of-band
    /// operational notification; the run itself aborts with the error.
    RetriesExhausted { operation: String, attempts: usize },

    /// A synchronize run completed
    SyncCompleted { report: SyncReport },

    /// A defragment run completed
    DefragCompleted { entries_moved: usize, patches: usize },
}

/// Core synchronization engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Call [`SyncEngine::synchronize()`] with the desired item set, or
///    [`SyncEngine::defragment()`] on a maintenance schedule
/// 3. Read the returned report; drain the event receiver for observability
///
/// The engine owns no persistent state: the partition index is rebuilt from
/// a full read every run, because the remote store is the only source of
/// truth.
pub struct SyncEngine {
    /// Partition store backend
    store: Box<dyn PartitionStore>,

    /// Partition naming and sizing
    name_prefix: String,
    capacity: usize,

    /// Retry policy applied to every store call
    retry: RetryPolicy,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `store`: partition store implementation
    /// - `config`: synchronization configuration (validated here)
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine events.
    pub fn new(
        store: Box<dyn PartitionStore>,
        config: &SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            store,
            name_prefix: config.partition.name_prefix.clone(),
            capacity: config.partition.capacity,
            retry: RetryPolicy::from_config(&config.retry),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Make the remote partitions match `desired` exactly.
    ///
    /// `desired` must be deduplicated and in the caller's preferred order;
    /// order determines which items fill freed slots and which end up in
    /// new partitions. An empty slice is valid and removes everything.
    ///
    /// On success the union of items across all managed partitions equals
    /// `desired`. A failure mid-application leaves the already-applied
    /// patches committed; rerunning reconverges from fresh reads.
    pub async fn synchronize(&self, desired: &[String]) -> Result<SyncReport> {
        let run_start = Utc::now();

        let observed = self.read_managed_partitions().await?;
        info!(
            "Synchronizing {} desired items against {} managed partitions",
            desired.len(),
            observed.len()
        );

        let plan = reconcile::plan(
            desired,
            &observed,
            self.capacity,
            &self.name_prefix,
            run_start,
        );
        debug!(
            "Planned {} patches, {} creates ({} additions, {} removals)",
            plan.patches.len(),
            plan.creates.len(),
            plan.additions,
            plan.removals
        );

        self.apply_patches(&plan.patches).await?;

        for create in &plan.creates {
            self.store_call("create_partition", || {
                self.store.create_partition(&create.name, &create.items)
            })
            .await?;

            info!("Created \"{}\" with {} items", create.name, create.items.len());
            self.emit_event(EngineEvent::PartitionCreated {
                name: create.name.clone(),
                items: create.items.len(),
            });
        }

        let report = SyncReport {
            additions: plan.additions,
            removals: plan.removals,
            patches: plan.patches.len(),
            partitions_created: plan.creates.len(),
        };
        info!(
            "Synchronize done: {} additions, {} removals, {} patches, {} partitions created",
            report.additions, report.removals, report.patches, report.partitions_created
        );
        self.emit_event(EngineEvent::SyncCompleted {
            report: report.clone(),
        });

        Ok(report)
    }

    /// Re-pack all ordinal-scheme partitions oldest-first.
    ///
    /// Stable items concentrate in the early partitions so future
    /// `synchronize` churn touches only a small tail. Partitions left empty
    /// are reported for deletion by the caller (see
    /// [`Self::delete_partitions`]); prefix-named partitions
    /// outside the strict ordinal scheme are never touched and are reported
    /// as non-empty.
    pub async fn defragment(&self) -> Result<DefragReport> {
        let run_start = Utc::now();

        let partitions = self
            .store_call("list_partitions", || self.store.list_partitions())
            .await?;

        let mut chunks: Vec<(u32, Partition)> = Vec::new();
        let mut off_scheme: Vec<Partition> = Vec::new();
        for partition in partitions {
            if !naming::is_managed(&self.name_prefix, &partition.name) {
                continue;
            }
            match naming::parse_ordinal(&self.name_prefix, &partition.name) {
                Some(ordinal) => chunks.push((ordinal, partition)),
                None => off_scheme.push(partition),
            }
        }
        // The ordinal is the stable ordering key, not creation time.
        chunks.sort_by_key(|(ordinal, _)| *ordinal);

        let mut observed = Vec::with_capacity(chunks.len());
        for (_, partition) in &chunks {
            let items = self
                .store_call("list_partition_items", || {
                    self.store.list_partition_items(&partition.id)
                })
                .await?;
            observed.push(ObservedPartition {
                id: partition.id.clone(),
                name: partition.name.clone(),
                items,
            });
        }

        let plan = defrag::plan(&observed, self.capacity, run_start)?;
        info!(
            "Defragmenting {} partitions: {} items, {} to move, {} patches",
            observed.len(),
            plan.all_entries,
            plan.entries_to_move,
            plan.patches.len()
        );

        self.apply_patches(&plan.patches).await?;

        let assigned_lists = plan.non_empty.len();
        let mut non_empty_partitions = plan.non_empty;
        non_empty_partitions.extend(off_scheme);

        let report = DefragReport {
            chunks: observed.len(),
            all_entries: plan.all_entries,
            patches: plan.patches.len(),
            entries_to_move: plan.entries_to_move,
            assigned_lists,
            empty_lists: plan.empty.len(),
            non_empty_lists: non_empty_partitions.len(),
            empty_partitions: plan.empty,
            non_empty_partitions,
        };
        info!(
            "Defragment done: {} chunks, {} entries, {} moved, {} now empty",
            report.chunks, report.all_entries, report.entries_to_move, report.empty_lists
        );
        self.emit_event(EngineEvent::DefragCompleted {
            entries_moved: report.entries_to_move,
            patches: report.patches,
        });

        Ok(report)
    }

    /// Delete the given partitions, one provider call at a time.
    ///
    /// Defragmentation never deletes anything itself; it reports the
    /// partitions it emptied. Callers pass `report.empty_partitions` here
    /// once nothing references those partitions anymore. Returns the number
    /// deleted; a mid-sequence failure leaves earlier deletions committed.
    pub async fn delete_partitions(&self, partitions: &[Partition]) -> Result<usize> {
        for partition in partitions {
            self.store_call("delete_partition", || {
                self.store.delete_partition(&partition.id)
            })
            .await?;

            info!("Deleted empty partition \"{}\"", partition.name);
            self.emit_event(EngineEvent::PartitionDeleted {
                partition_id: partition.id.clone(),
                partition_name: partition.name.clone(),
            });
        }
        Ok(partitions.len())
    }

    /// Sequential full read of all prefix-managed partitions.
    ///
    /// Reads are sequenced to respect the provider's shared rate limit.
    async fn read_managed_partitions(&self) -> Result<Vec<ObservedPartition>> {
        let partitions = self
            .store_call("list_partitions", || self.store.list_partitions())
            .await?;

        let mut observed = Vec::new();
        for partition in partitions {
            if !naming::is_managed(&self.name_prefix, &partition.name) {
                debug!("Skipping unmanaged partition \"{}\"", partition.name);
                continue;
            }

            let items = self
                .store_call("list_partition_items", || {
                    self.store.list_partition_items(&partition.id)
                })
                .await?;
            observed.push(ObservedPartition {
                id: partition.id,
                name: partition.name,
                items,
            });
        }

        Ok(observed)
    }

    /// Apply planned patches one provider call at a time, in planned order
    async fn apply_patches(&self, patches: &[reconcile::PlannedPatch]) -> Result<()> {
        for planned in patches {
            self.store_call("patch_partition", || {
                self.store.patch_partition(&planned.partition_id, &planned.patch)
            })
            .await?;

            debug!(
                "Patched \"{}\": +{} -{}",
                planned.partition_name,
                planned.patch.append.len(),
                planned.patch.remove.len()
            );
            self.emit_event(EngineEvent::PatchApplied {
                partition_id: planned.partition_id.clone(),
                partition_name: planned.partition_name.clone(),
                appended: planned.patch.append.len(),
                removed: planned.patch.remove.len(),
            });
        }
        Ok(())
    }

    /// Route one store operation through the retry executor.
    ///
    /// Retry exhaustion additionally emits an event so an external
    /// collaborator can deliver the operational notification.
    async fn store_call<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = retry::execute_with_retry(&self.retry, operation, f).await;

        if let Err(Error::RetryExhausted { attempts, .. }) = &result {
            self.emit_event(EngineEvent::RetriesExhausted {
                operation: operation.to_string(),
                attempts: *attempts,
            });
        }

        result
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // try_send so an undrained channel never blocks the run; dropping
        // under backpressure is preferred over unbounded growth.
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event");
        }
    }
}
