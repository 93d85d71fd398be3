//! Built-in partition store backends
//!
//! - [`MemoryPartitionStore`]: in-memory, for tests and embedded use.
//!
//! The Cloudflare Zero Trust backend lives in the
//! `gatesync-store-cloudflare` crate.

pub mod memory;

pub use memory::{MemoryPartitionStore, MemoryStoreFactory};
