// # Memory Partition Store
//
// In-memory implementation of PartitionStore.
//
// ## Purpose
//
// Provides a capacity- and page-size-faithful store without a remote
// provider. Useful for tests, embedded usage, and dry exercising of the
// engine: it enforces the same partition capacity the real store would, so
// the engine's no-overflow invariant is observable, and it truncates item
// listings to the page size so the documented accuracy boundary can be
// reproduced.
//
// ## Persistence
//
// None. All partitions are lost when the store is dropped.

use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::Error;
use crate::traits::{Item, Partition, PartitionStore, PartitionStoreFactory, Patch};

#[derive(Debug, Clone)]
struct StoredPartition {
    id: String,
    name: String,
    items: Vec<Item>,
}

#[derive(Debug, Default)]
struct Inner {
    partitions: Vec<StoredPartition>,
    next_id: u64,
}

/// In-memory partition store implementation
///
/// Partitions are kept in creation order behind an `Arc<RwLock<..>>`; the
/// store is cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct MemoryPartitionStore {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
    page_size: usize,
}

impl MemoryPartitionStore {
    /// Create an empty store with the given partition capacity.
    ///
    /// The page size defaults to the capacity, matching the remote store's
    /// behavior.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            capacity,
            page_size: capacity,
        }
    }

    /// Override the item-listing page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Seed a partition directly, bypassing the store API (test setup).
    ///
    /// Still refuses to overfill a partition.
    pub async fn seed_partition(
        &self,
        name: impl Into<String>,
        items: Vec<Item>,
    ) -> Result<Partition, Error> {
        if items.len() > self.capacity {
            return Err(Error::capacity_exceeded(items.len(), self.capacity));
        }
        let mut inner = self.inner.write().await;
        let id = format!("mem-{}", inner.next_id);
        inner.next_id += 1;
        let name = name.into();
        inner.partitions.push(StoredPartition {
            id: id.clone(),
            name: name.clone(),
            items,
        });
        Ok(Partition { id, name })
    }

    /// Number of partitions currently held
    pub async fn partition_count(&self) -> usize {
        self.inner.read().await.partitions.len()
    }

    /// All item values across all partitions, in partition order
    pub async fn all_values(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .partitions
            .iter()
            .flat_map(|p| p.items.iter().map(|i| i.value.clone()))
            .collect()
    }

    /// The full (untruncated) contents of one partition, if it exists
    pub async fn partition_items(&self, id: &str) -> Option<Vec<Item>> {
        let inner = self.inner.read().await;
        inner
            .partitions
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.items.clone())
    }
}

#[async_trait]
impl PartitionStore for MemoryPartitionStore {
    async fn list_partitions(&self) -> Result<Vec<Partition>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .partitions
            .iter()
            .map(|p| Partition {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect())
    }

    async fn list_partition_items(&self, id: &str) -> Result<Vec<Item>, Error> {
        let inner = self.inner.read().await;
        let partition = inner
            .partitions
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::partition_not_found(id))?;

        if partition.items.len() > self.page_size {
            warn!(
                "Partition \"{}\" holds {} items but the page size is {}; only a prefix was inspected",
                partition.name,
                partition.items.len(),
                self.page_size
            );
        }
        Ok(partition
            .items
            .iter()
            .take(self.page_size)
            .cloned()
            .collect())
    }

    async fn create_partition(&self, name: &str, items: &[Item]) -> Result<Partition, Error> {
        if items.len() > self.capacity {
            return Err(Error::capacity_exceeded(items.len(), self.capacity));
        }

        let mut inner = self.inner.write().await;
        let id = format!("mem-{}", inner.next_id);
        inner.next_id += 1;
        inner.partitions.push(StoredPartition {
            id: id.clone(),
            name: name.to_string(),
            items: items.to_vec(),
        });
        info!("Created partition \"{}\" with {} items", name, items.len());
        Ok(Partition {
            id,
            name: name.to_string(),
        })
    }

    async fn patch_partition(&self, id: &str, patch: &Patch) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        let capacity = self.capacity;
        let partition = inner
            .partitions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::partition_not_found(id))?;

        let retained = partition
            .items
            .iter()
            .filter(|item| !patch.remove.contains(&item.value))
            .count();
        if retained + patch.append.len() > capacity {
            return Err(Error::capacity_exceeded(
                retained + patch.append.len(),
                capacity,
            ));
        }

        partition
            .items
            .retain(|item| !patch.remove.contains(&item.value));
        partition.items.extend(patch.append.iter().cloned());
        Ok(())
    }

    async fn delete_partition(&self, id: &str) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        let before = inner.partitions.len();
        inner.partitions.retain(|p| p.id != id);
        if inner.partitions.len() == before {
            return Err(Error::partition_not_found(id));
        }
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory stores from configuration
pub struct MemoryStoreFactory;

impl PartitionStoreFactory for MemoryStoreFactory {
    fn create(
        &self,
        config: &crate::config::SyncConfig,
    ) -> Result<Box<dyn PartitionStore>, Error> {
        let store = MemoryPartitionStore::new(config.partition.capacity)
            .with_page_size(config.partition.effective_page_size());
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_patch_delete_round_trip() {
        let store = MemoryPartitionStore::new(3);

        let partition = store
            .create_partition("Test - Chunk 1", &[Item::new("a"), Item::new("b")])
            .await
            .unwrap();

        let patch = Patch {
            append: vec![Item::new("c")],
            remove: vec!["a".to_string()],
        };
        store.patch_partition(&partition.id, &patch).await.unwrap();

        let items = store.list_partition_items(&partition.id).await.unwrap();
        let values: Vec<&str> = items.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["b", "c"]);

        store.delete_partition(&partition.id).await.unwrap();
        assert_eq!(store.partition_count().await, 0);
    }

    #[tokio::test]
    async fn create_rejects_overfull_partitions() {
        let store = MemoryPartitionStore::new(2);
        let items = vec![Item::new("a"), Item::new("b"), Item::new("c")];

        let result = store.create_partition("Test - Chunk 1", &items).await;
        assert!(matches!(
            result,
            Err(Error::CapacityExceeded {
                requested: 3,
                capacity: 2
            })
        ));
    }

    #[tokio::test]
    async fn patch_rejects_overflow() {
        let store = MemoryPartitionStore::new(2);
        let partition = store
            .create_partition("Test - Chunk 1", &[Item::new("a"), Item::new("b")])
            .await
            .unwrap();

        let patch = Patch {
            append: vec![Item::new("c")],
            remove: vec![],
        };
        let result = store.patch_partition(&partition.id, &patch).await;
        assert!(matches!(result, Err(Error::CapacityExceeded { .. })));

        // Swapping one out for one in is fine.
        let swap = Patch {
            append: vec![Item::new("c")],
            remove: vec!["a".to_string()],
        };
        store.patch_partition(&partition.id, &swap).await.unwrap();
    }

    #[tokio::test]
    async fn listing_truncates_to_the_page_size() {
        let store = MemoryPartitionStore::new(10).with_page_size(2);
        let partition = store
            .create_partition(
                "Test - Chunk 1",
                &[Item::new("a"), Item::new("b"), Item::new("c")],
            )
            .await
            .unwrap();

        let items = store.list_partition_items(&partition.id).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn missing_partition_is_reported() {
        let store = MemoryPartitionStore::new(2);

        let result = store.patch_partition("mem-404", &Patch::default()).await;
        assert!(matches!(result, Err(Error::PartitionNotFound(_))));

        let result = store.delete_partition("mem-404").await;
        assert!(matches!(result, Err(Error::PartitionNotFound(_))));
    }
}
