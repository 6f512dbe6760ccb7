//! Invalidating strategy without soft locks.
//!
//! Writes go straight to the store and the lock hooks drop the key, so readers
//! may see a stale value until the next invalidation.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use regio_core::{is_version_older, AccessType, RegioResult, Timestamp, Version};

use super::{put_loaded_value, read_value, EntityRegionAccess};
use crate::entry::{CacheEntry, CacheValue};
use crate::region::Region;
use crate::soft_lock::SoftLock;

/// Strategy that tolerates short stale windows in exchange for no locking.
///
/// `lock_item` and `unlock_item` both invalidate the key, so a failed or
/// slow transaction at worst forces a reload.
pub struct NonstrictReadWriteAccess<V> {
    region: Arc<Region>,
    _value: PhantomData<fn() -> V>,
}

impl<V> NonstrictReadWriteAccess<V> {
    pub fn new(region: Arc<Region>) -> Self {
        Self {
            region,
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for NonstrictReadWriteAccess<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonstrictReadWriteAccess")
            .field("region", &self.region.name())
            .finish()
    }
}

#[async_trait]
impl<V: CacheValue> EntityRegionAccess<V> for NonstrictReadWriteAccess<V> {
    fn region(&self) -> &Region {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::NonstrictReadWrite
    }

    async fn get(&self, key: &str, _tx_timestamp: Timestamp) -> RegioResult<Option<V>> {
        tracing::trace!(region = %self.region.name(), key, "get");
        read_value(&self.region, key).await
    }

    async fn put_from_load(
        &self,
        key: &str,
        value: V,
        _tx_timestamp: Timestamp,
        version: Option<Version>,
        minimal_put_override: bool,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, minimal_put_override, "put_from_load");
        put_loaded_value(&self.region, key, value, version, minimal_put_override).await
    }

    async fn insert(&self, key: &str, value: V, version: Option<Version>) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "insert");
        self.region.put_item(key, value, version, "insert").await?;
        Ok(true)
    }

    async fn after_insert(
        &self,
        key: &str,
        _value: V,
        _version: Option<Version>,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "after_insert");
        Ok(false)
    }

    async fn update(
        &self,
        key: &str,
        value: V,
        current_version: Option<Version>,
        _previous_version: Option<Version>,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "update");
        if let Some(CacheEntry::Item(stored)) = self.region.get_entry::<V>(key, "update").await? {
            // A concurrent writer already moved the value past this update.
            if is_version_older(current_version.as_ref(), stored.version.as_ref()) {
                self.region.record_skipped_put();
                tracing::debug!(
                    region = %self.region.name(),
                    key,
                    ?current_version,
                    stored_version = ?stored.version,
                    "update skipped, cached version is newer"
                );
                return Ok(false);
            }
        }
        self.region
            .put_item(key, value, current_version, "update")
            .await?;
        Ok(true)
    }

    async fn after_update(
        &self,
        key: &str,
        _value: V,
        _current_version: Option<Version>,
        _previous_version: Option<Version>,
        _lock: Option<&SoftLock>,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "after_update");
        Ok(false)
    }

    async fn remove(&self, key: &str) -> RegioResult<()> {
        tracing::trace!(region = %self.region.name(), key, "remove");
        self.region.evict(key, "remove").await.map(|_| ())
    }

    async fn lock_item(
        &self,
        key: &str,
        _version: Option<Version>,
    ) -> RegioResult<Option<SoftLock>> {
        tracing::trace!(region = %self.region.name(), key, "lock_item");
        self.region.evict(key, "lock_item").await?;
        Ok(None)
    }

    async fn unlock_item(&self, key: &str, _lock: Option<&SoftLock>) -> RegioResult<()> {
        tracing::trace!(region = %self.region.name(), key, "unlock_item");
        self.region.evict(key, "unlock_item").await.map(|_| ())
    }
}
