//! Entity region access strategies.
//!
//! The persistence framework drives every cached mutation through a two-phase
//! protocol: a staging call made inside the database transaction (`insert`,
//! `update`, `lock_item`) and a completion call made once the outcome is known
//! (`after_insert`, `after_update`, `unlock_item`). Each strategy decides what
//! each phase does:
//!
//! | Strategy | Staging phase | Completion phase |
//! |----------|---------------|------------------|
//! | [`ReadOnlyAccess`] | write on insert, reject update | nothing |
//! | [`NonstrictReadWriteAccess`] | invalidate, then write | invalidate on unlock |
//! | [`ReadWriteAccess`] | soft-lock the key | write and clear the lock |
//! | [`TransactionalAccess`] | write | nothing |
//!
//! Strategies are selected when the region is configured, see
//! [`build_entity_access`].

mod nonstrict;
mod read_only;
mod read_write;
mod transactional;

pub use nonstrict::NonstrictReadWriteAccess;
pub use read_only::ReadOnlyAccess;
pub use read_write::ReadWriteAccess;
pub use transactional::TransactionalAccess;

use std::sync::Arc;

use async_trait::async_trait;
use regio_core::{AccessType, RegioResult, Timestamp, Version};

use crate::entry::{CacheEntry, CacheValue};
use crate::region::Region;
use crate::soft_lock::SoftLock;

/// Region access contract for entity data.
///
/// Every store failure surfaces as
/// [`AccessError::CacheOperationFailed`](regio_core::AccessError::CacheOperationFailed).
/// Nothing is retried.
#[async_trait]
pub trait EntityRegionAccess<V: CacheValue>: Send + Sync {
    /// The region this strategy reads and writes.
    fn region(&self) -> &Region;

    /// Which strategy this is.
    fn access_type(&self) -> AccessType;

    /// Read a cached value for a transaction that started at `tx_timestamp`.
    async fn get(&self, key: &str, tx_timestamp: Timestamp) -> RegioResult<Option<V>>;

    /// Cache a value just loaded from the database.
    ///
    /// Returns whether the value was written. With `minimal_put_override`
    /// set, an already occupied key is left alone.
    async fn put_from_load(
        &self,
        key: &str,
        value: V,
        tx_timestamp: Timestamp,
        version: Option<Version>,
        minimal_put_override: bool,
    ) -> RegioResult<bool>;

    /// [`put_from_load`](Self::put_from_load) using the region's `minimal_puts` setting.
    async fn put_from_load_default(
        &self,
        key: &str,
        value: V,
        tx_timestamp: Timestamp,
        version: Option<Version>,
    ) -> RegioResult<bool> {
        let minimal_puts = self.region().config().minimal_puts;
        self.put_from_load(key, value, tx_timestamp, version, minimal_puts)
            .await
    }

    /// Called inside the transaction that inserts the entity.
    async fn insert(&self, key: &str, value: V, version: Option<Version>) -> RegioResult<bool>;

    /// Called after the insert committed.
    async fn after_insert(&self, key: &str, value: V, version: Option<Version>)
        -> RegioResult<bool>;

    /// Called inside the transaction that updates the entity.
    async fn update(
        &self,
        key: &str,
        value: V,
        current_version: Option<Version>,
        previous_version: Option<Version>,
    ) -> RegioResult<bool>;

    /// Called after the update committed, with the handle from
    /// [`lock_item`](Self::lock_item).
    async fn after_update(
        &self,
        key: &str,
        value: V,
        current_version: Option<Version>,
        previous_version: Option<Version>,
        lock: Option<&SoftLock>,
    ) -> RegioResult<bool>;

    /// Delete the key unconditionally.
    async fn remove(&self, key: &str) -> RegioResult<()>;

    /// Open the write window for `key`.
    async fn lock_item(&self, key: &str, version: Option<Version>)
        -> RegioResult<Option<SoftLock>>;

    /// Close the write window opened by [`lock_item`](Self::lock_item).
    async fn unlock_item(&self, key: &str, lock: Option<&SoftLock>) -> RegioResult<()>;

    /// Drop one key whatever it holds.
    async fn evict(&self, key: &str) -> RegioResult<()> {
        tracing::trace!(region = %self.region().name(), key, "evict");
        self.region().evict(key, "evict").await.map(|_| ())
    }

    /// Drop every key of the region. Returns how many were removed.
    async fn evict_all(&self) -> RegioResult<u64> {
        self.region().evict_all().await
    }

    async fn remove_all(&self) -> RegioResult<u64> {
        self.evict_all().await
    }

    /// Region-wide soft locks are not supported; always `None`.
    async fn lock_region(&self) -> RegioResult<Option<SoftLock>> {
        Ok(None)
    }

    /// Evicts the whole region so every key reloads.
    async fn unlock_region(&self, _lock: Option<&SoftLock>) -> RegioResult<()> {
        self.evict_all().await.map(|_| ())
    }
}

/// Build the strategy for `access_type` over `region`.
pub fn build_entity_access<V: CacheValue>(
    region: Arc<Region>,
    access_type: AccessType,
) -> Arc<dyn EntityRegionAccess<V>> {
    tracing::debug!(region = %region.name(), %access_type, "building entity region access");
    match access_type {
        AccessType::ReadOnly => Arc::new(ReadOnlyAccess::<V>::new(region)),
        AccessType::NonstrictReadWrite => Arc::new(NonstrictReadWriteAccess::<V>::new(region)),
        AccessType::ReadWrite => Arc::new(ReadWriteAccess::<V>::new(region)),
        AccessType::Transactional => Arc::new(TransactionalAccess::<V>::new(region)),
    }
}

/// Build the strategy named by the region's `default_access_type`, for
/// mappings that do not pick one.
pub fn build_default_entity_access<V: CacheValue>(
    region: Arc<Region>,
) -> Arc<dyn EntityRegionAccess<V>> {
    let access_type = region.config().default_access_type;
    build_entity_access(region, access_type)
}

/// Plain read used by every strategy without soft locks. A lock left behind
/// by a read-write strategy on the same region reads as a miss.
async fn read_value<V: CacheValue>(region: &Region, key: &str) -> RegioResult<Option<V>> {
    match region.get_entry::<V>(key, "get").await? {
        Some(CacheEntry::Item(item)) => {
            region.record_hit();
            Ok(Some(item.value))
        }
        Some(CacheEntry::Lock(_)) | None => {
            region.record_miss();
            Ok(None)
        }
    }
}

/// Load-time write used by every strategy without soft locks.
async fn put_loaded_value<V: CacheValue>(
    region: &Region,
    key: &str,
    value: V,
    version: Option<Version>,
    minimal_put_override: bool,
) -> RegioResult<bool> {
    if minimal_put_override && region.contains(key, "put_from_load").await? {
        region.record_skipped_put();
        tracing::debug!(region = %region.name(), key, "minimal put skipped, key already cached");
        return Ok(false);
    }
    region.put_item(key, value, version, "put_from_load").await?;
    Ok(true)
}
