//! Regio Store - Store Client Contract and Backends
//!
//! Defines the key-value store abstraction that cache regions write to,
//! the region-scoped key format, and two backends: an in-memory map and an
//! LMDB environment. A remote client (Redis, Memcached, ...) plugs in by
//! implementing [`StoreClient`].

pub mod key;
pub mod lmdb;
pub mod memory;
pub mod traits;

pub use key::RegionScopedKey;
pub use lmdb::LmdbStore;
pub use memory::InMemoryStore;
pub use traits::{StoreClient, StoreStats};
