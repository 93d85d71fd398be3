// # Partition Store Trait
//
// Defines the interface for reading and mutating fixed-capacity partitions
// in a remote store.
//
// ## Implementations
//
// - Cloudflare Zero Trust Gateway lists: `gatesync-store-cloudflare` crate
// - In-memory: [`crate::store::MemoryPartitionStore`] (testing, embedding)
//
// ## Trust level
//
// Store backends are untrusted, single-shot components. They perform exactly
// one remote call per method invocation and propagate every failure to the
// caller. Retry, backoff, and rate-limit handling are owned by the engine's
// request executor (`crate::retry`); scheduling is owned by the engine.
// Backends must not spawn tasks, cache state between calls, or sleep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single item held by a partition.
///
/// The value is opaque to this crate: normalization and validation happen
/// upstream. The timestamp records when the item was added to the store and
/// drives defragmentation ordering; it is optional because older entries and
/// some backends do not carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// The item value (e.g. a canonical domain)
    pub value: String,

    /// When the item was added to the store, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create an item without timestamp metadata
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            added_at: None,
        }
    }

    /// Create an item stamped with the given timestamp
    pub fn with_added_at(value: impl Into<String>, added_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            added_at: Some(added_at),
        }
    }
}

/// Partition metadata: an opaque ID plus the ordinal-encoding name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// The store-assigned partition ID
    pub id: String,
    /// The partition name (`"<prefix> - Chunk <ordinal>"` for managed ones)
    pub name: String,
}

/// The unit of mutation sent to the store, scoped to one partition.
///
/// `append` and `remove` may both be present; removal is by item value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Items to append, with optional timestamp metadata
    pub append: Vec<Item>,
    /// Item values to remove
    pub remove: Vec<String>,
}

impl Patch {
    /// Whether this patch would be a no-op
    pub fn is_empty(&self) -> bool {
        self.append.is_empty() && self.remove.is_empty()
    }
}

/// Trait for partition store backends
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Single-shot semantics
///
/// Every method performs at most one remote call and returns the outcome
/// as-is. Errors must be mapped to the crate taxonomy so the engine's retry
/// policy can classify them:
///
/// - connection-level failures → [`crate::Error::Transport`]
/// - a vanished partition → [`crate::Error::PartitionNotFound`]
/// - any other non-success status → [`crate::Error::Http`]
#[async_trait]
pub trait PartitionStore: Send + Sync + std::fmt::Debug {
    /// List all partitions (metadata only; no items are fetched)
    async fn list_partitions(&self) -> Result<Vec<Partition>, crate::Error>;

    /// List the items of one partition, up to the configured page size.
    ///
    /// When the partition truly holds more items than one page,
    /// implementations return the first page and log a warning: only a
    /// prefix was inspected. Callers treat the result as the observed state.
    async fn list_partition_items(&self, id: &str) -> Result<Vec<Item>, crate::Error>;

    /// Create a partition with the given name and initial items.
    ///
    /// Fails with [`crate::Error::CapacityExceeded`] when more items are
    /// submitted than one partition can hold; chunking beforehand is the
    /// caller's responsibility.
    async fn create_partition(&self, name: &str, items: &[Item])
    -> Result<Partition, crate::Error>;

    /// Apply an append/remove patch to one partition
    async fn patch_partition(&self, id: &str, patch: &Patch) -> Result<(), crate::Error>;

    /// Delete a partition
    async fn delete_partition(&self, id: &str) -> Result<(), crate::Error>;

    /// Get the backend name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing partition stores from configuration
pub trait PartitionStoreFactory: Send + Sync {
    /// Create a store instance from configuration
    fn create(
        &self,
        config: &crate::config::SyncConfig,
    ) -> Result<Box<dyn PartitionStore>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_emptiness() {
        assert!(Patch::default().is_empty());

        let append_only = Patch {
            append: vec![Item::new("example.com")],
            remove: vec![],
        };
        assert!(!append_only.is_empty());

        let remove_only = Patch {
            append: vec![],
            remove: vec!["example.com".to_string()],
        };
        assert!(!remove_only.is_empty());
    }

    #[test]
    fn item_serialization_omits_missing_timestamp() {
        let item = Item::new("example.com");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({ "value": "example.com" }));
    }
}
