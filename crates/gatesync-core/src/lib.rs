// # gatesync-core
//
// Core library for synchronizing a large, ordered set of opaque string
// items into a remote store of fixed-capacity partitions.
//
// ## Architecture Overview
//
// - **PartitionStore**: Trait for typed partition access (list, list-items,
//   create, patch, delete); backends are single-shot and untrusted
// - **retry**: Rate-limit-aware request execution wrapped around every
//   store call; retry policy is an explicit, testable decision function
// - **SyncEngine**: Orchestrates reconciliation (`synchronize`) and
//   defragmentation (`defragment`) runs and reports summaries
// - **StoreRegistry**: Plugin-based registry for store backends
//
// ## Design Principles
//
// 1. **Remote store is the source of truth**: the partition index is
//    rebuilt from a full read every run and never persisted
// 2. **Sequenced by design**: one provider call at a time, because the
//    provider rate limit is shared
// 3. **Minimal edits**: removals and additions are co-located into one
//    patch per partition wherever possible
// 4. **Errors are values**: the retry decision is data-driven, never
//    exception-driven control flow

pub mod config;
pub mod engine;
pub mod error;
pub mod naming;
pub mod registry;
pub mod report;
pub mod retry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, PartitionConfig, RetryConfig, StoreConfig, SyncConfig};
pub use engine::{EngineEvent, ObservedPartition, SyncEngine};
pub use error::{Error, Result};
pub use registry::StoreRegistry;
pub use report::{DefragReport, SyncReport};
pub use retry::{RetryDecision, RetryPolicy};
pub use store::MemoryPartitionStore;
pub use traits::{Item, Partition, PartitionStore, PartitionStoreFactory, Patch};
