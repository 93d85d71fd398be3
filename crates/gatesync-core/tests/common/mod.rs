//! Test doubles and common utilities for contract tests

use async_trait::async_trait;
use gatesync_core::error::Result;
use gatesync_core::traits::{Item, Partition, PartitionStore, Patch};
use gatesync_core::{
    EngineEvent, Error, MemoryPartitionStore, StoreConfig, SyncConfig, SyncEngine,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

pub const PREFIX: &str = "Gatesync List";

/// A config with zero retry delays so failing tests don't sleep
pub fn test_config(capacity: usize) -> SyncConfig {
    let mut config = SyncConfig::new(StoreConfig::Memory);
    config.partition.capacity = capacity;
    config.partition.name_prefix = PREFIX.to_string();
    config.retry.max_attempts = 3;
    config.retry.backoff_secs = 0;
    config.retry.rate_limit_cooldown_secs = 0;
    config
}

/// Build an engine over the given store
pub fn engine_over(
    store: Box<dyn PartitionStore>,
    config: &SyncConfig,
) -> (SyncEngine, mpsc::Receiver<EngineEvent>) {
    SyncEngine::new(store, config).expect("engine construction succeeds")
}

/// Sorted union of all item values across the store's partitions
pub async fn sorted_values(store: &MemoryPartitionStore) -> Vec<String> {
    let mut values = store.all_values().await;
    values.sort();
    values
}

/// Desired-items helper
pub fn desired(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Items-without-timestamps helper
pub fn items(values: &[&str]) -> Vec<Item> {
    values.iter().map(|v| Item::new(*v)).collect()
}

/// A store where every operation fails with a transport error, counting calls
#[derive(Debug, Default)]
pub struct FailingStore {
    pub calls: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::transport("store offline"))
    }
}

#[async_trait]
impl PartitionStore for FailingStore {
    async fn list_partitions(&self) -> Result<Vec<Partition>> {
        self.fail()
    }

    async fn list_partition_items(&self, _id: &str) -> Result<Vec<Item>> {
        self.fail()
    }

    async fn create_partition(&self, _name: &str, _items: &[Item]) -> Result<Partition> {
        self.fail()
    }

    async fn patch_partition(&self, _id: &str, _patch: &Patch) -> Result<()> {
        self.fail()
    }

    async fn delete_partition(&self, _id: &str) -> Result<()> {
        self.fail()
    }

    fn store_name(&self) -> &'static str {
        "failing"
    }
}

/// A pass-through store that deletes one partition right before the first
/// patch touches it, simulating out-of-band deletion inside the
/// read-then-patch window.
#[derive(Debug)]
pub struct VanishingStore {
    inner: MemoryPartitionStore,
    victim: String,
    vanished: AtomicBool,
    pub patch_attempts: Arc<AtomicUsize>,
}

impl VanishingStore {
    pub fn new(inner: MemoryPartitionStore, victim: impl Into<String>) -> Self {
        Self {
            inner,
            victim: victim.into(),
            vanished: AtomicBool::new(false),
            patch_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl PartitionStore for VanishingStore {
    async fn list_partitions(&self) -> Result<Vec<Partition>> {
        self.inner.list_partitions().await
    }

    async fn list_partition_items(&self, id: &str) -> Result<Vec<Item>> {
        self.inner.list_partition_items(id).await
    }

    async fn create_partition(&self, name: &str, items: &[Item]) -> Result<Partition> {
        self.inner.create_partition(name, items).await
    }

    async fn patch_partition(&self, id: &str, patch: &Patch) -> Result<()> {
        if id == self.victim && !self.vanished.swap(true, Ordering::SeqCst) {
            self.inner.delete_partition(&self.victim).await?;
        }
        self.patch_attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.patch_partition(id, patch).await
    }

    async fn delete_partition(&self, id: &str) -> Result<()> {
        self.inner.delete_partition(id).await
    }

    fn store_name(&self) -> &'static str {
        "vanishing"
    }
}

/// Drain every event currently buffered in the receiver
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
