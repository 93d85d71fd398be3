//! Core traits for the synchronization system
//!
//! This module defines the abstract interface that all partition store
//! backends must follow.
//!
//! - [`PartitionStore`]: typed access to a remote partitioned list store

pub mod partition_store;

pub use partition_store::{Item, Partition, PartitionStore, PartitionStoreFactory, Patch};
