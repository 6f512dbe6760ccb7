//! Regio Access - Region Access Strategies
//!
//! Second-level cache regions on top of a [`StoreClient`](regio_store::StoreClient).
//! A [`Region`] scopes keys and configuration; an [`EntityRegionAccess`]
//! implementation decides when the persistence framework's reads and writes
//! may touch the store:
//!
//! - [`ReadOnlyAccess`]: immutable data, updates are rejected
//! - [`NonstrictReadWriteAccess`]: direct writes, short stale windows
//! - [`ReadWriteAccess`]: soft locks stored in the value slot
//! - [`TransactionalAccess`]: direct writes, store trusted to follow the transaction
//!
//! ```ignore
//! use std::sync::Arc;
//! use regio_access::{build_entity_access, Region};
//! use regio_core::{AccessType, RegionConfig};
//! use regio_store::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let region = Arc::new(Region::new("users", store, RegionConfig::default())?);
//! let access = build_entity_access::<String>(region.clone(), AccessType::ReadWrite);
//! let lock = access.lock_item("user:1", None).await?;
//! access.after_update("user:1", "alice".into(), None, None, lock.as_ref()).await?;
//! ```

pub mod entry;
pub mod region;
pub mod soft_lock;
pub mod strategy;

pub use entry::{CacheEntry, CacheValue, CachedItem};
pub use region::{Region, RegionStats};
pub use soft_lock::SoftLock;
pub use strategy::{
    build_default_entity_access, build_entity_access, EntityRegionAccess,
    NonstrictReadWriteAccess, ReadOnlyAccess, ReadWriteAccess, TransactionalAccess,
};
