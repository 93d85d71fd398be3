//! Plugin-based store registry
//!
//! The registry allows partition store backends to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatesync_core::registry::StoreRegistry;
//!
//! let registry = StoreRegistry::new();
//! registry.register_store("cloudflare", Box::new(cloudflare_factory));
//!
//! let store = registry.create_store(&config)?;
//! ```
//!
//! Backend crates should expose a `register()` function that installs their
//! factory during initialization.

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::store::MemoryStoreFactory;
use crate::traits::{PartitionStore, PartitionStoreFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry for plugin-based partition store creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct StoreRegistry {
    /// Registered store factories
    stores: RwLock<HashMap<String, Box<dyn PartitionStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in memory backend registered
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryStoreFactory));
        registry
    }

    /// Register a store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "cloudflare", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn PartitionStoreFactory>) {
        let mut stores = self.stores.write().unwrap();
        stores.insert(name.into(), factory);
    }

    /// Create a store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn PartitionStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_store(&self, config: &SyncConfig) -> Result<Box<dyn PartitionStore>> {
        let store_type = config.store.type_name();
        let stores = self.stores.read().unwrap();

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config)
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap();
        stores.keys().cloned().collect()
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap();
        stores.contains_key(name)
    }
}
