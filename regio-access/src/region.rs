//! Cache regions.
//!
//! A region is a named slice of the store's key space together with the
//! configuration every access strategy on it shares. All store traffic of the
//! strategies goes through the region, which is where store failures become
//! [`AccessError::CacheOperationFailed`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regio_core::{
    validate_region_name, AccessError, RegionConfig, RegioError, RegioResult, StoreError,
    Timestamp, Timestamper, Version,
};
use regio_store::{RegionScopedKey, StoreClient};

use crate::entry::{CacheEntry, CacheValue, CachedItem};

/// Named partition of the store.
pub struct Region {
    name: String,
    store: Arc<dyn StoreClient>,
    config: RegionConfig,
    timestamper: Timestamper,
    counters: RegionCounters,
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Region {
    /// Create a region after validating its name and configuration.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn StoreClient>,
        config: RegionConfig,
    ) -> RegioResult<Self> {
        let name = name.into();
        validate_region_name(&name)?;
        config.validate()?;
        tracing::debug!(region = %name, store = store.name(), ?config, "region created");
        Ok(Self {
            name,
            store,
            config,
            timestamper: Timestamper::new(),
            counters: RegionCounters::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    /// Soft-lock lifetime for this region.
    pub fn lock_timeout(&self) -> Duration {
        self.config.lock_timeout
    }

    /// Next timestamp from the region's monotonic clock.
    ///
    /// Transaction start times passed to `get`/`put_from_load` should come
    /// from here so they order correctly against entry timestamps.
    pub fn next_timestamp(&self) -> Timestamp {
        self.timestamper.next()
    }

    /// Store key for an entity key of this region.
    pub fn scoped_key(&self, key: &str) -> RegionScopedKey {
        RegionScopedKey::new(self.name.as_str(), key)
    }

    /// Snapshot of the region's counters.
    pub fn stats(&self) -> RegionStats {
        self.counters.snapshot()
    }

    fn failed(&self, operation: &'static str, key: Option<&str>, source: StoreError) -> RegioError {
        tracing::warn!(
            region = %self.name,
            key = key.unwrap_or("*"),
            operation,
            store = self.store.name(),
            error = %source,
            "store operation failed"
        );
        RegioError::Access(AccessError::CacheOperationFailed {
            region: self.name.clone(),
            operation,
            source,
        })
    }

    /// Read and decode the slot for `key`.
    pub async fn get_entry<V: CacheValue>(
        &self,
        key: &str,
        operation: &'static str,
    ) -> RegioResult<Option<CacheEntry<V>>> {
        let encoded = self.scoped_key(key).encode();
        let bytes = self
            .store
            .get(&encoded)
            .await
            .map_err(|e| self.failed(operation, Some(key), e))?;
        bytes
            .map(|b| CacheEntry::decode(&b))
            .transpose()
            .map_err(|e| self.failed(operation, Some(key), e))
    }

    /// Encode and write a slot.
    pub async fn put_entry<V: CacheValue>(
        &self,
        key: &str,
        entry: &CacheEntry<V>,
        operation: &'static str,
    ) -> RegioResult<()> {
        let bytes = entry
            .encode()
            .map_err(|e| self.failed(operation, Some(key), e))?;
        self.store
            .set(&self.scoped_key(key).encode(), bytes)
            .await
            .map_err(|e| self.failed(operation, Some(key), e))
    }

    /// Write a fresh item stamped with the next region timestamp.
    pub async fn put_item<V: CacheValue>(
        &self,
        key: &str,
        value: V,
        version: Option<Version>,
        operation: &'static str,
    ) -> RegioResult<()> {
        let entry = CacheEntry::Item(CachedItem {
            value,
            version,
            timestamp: self.next_timestamp(),
        });
        self.put_entry(key, &entry, operation).await?;
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Whether the slot for `key` holds anything (item or lock).
    pub async fn contains(&self, key: &str, operation: &'static str) -> RegioResult<bool> {
        self.store
            .exists(&self.scoped_key(key).encode())
            .await
            .map_err(|e| self.failed(operation, Some(key), e))
    }

    /// Delete the slot for `key`. Returns whether something was removed.
    pub async fn evict(&self, key: &str, operation: &'static str) -> RegioResult<bool> {
        let removed = self
            .store
            .delete(&self.scoped_key(key).encode())
            .await
            .map_err(|e| self.failed(operation, Some(key), e))?;
        if removed {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Delete every slot of this region.
    pub async fn evict_all(&self) -> RegioResult<u64> {
        let removed = self
            .store
            .delete_prefix(&RegionScopedKey::region_prefix(&self.name))
            .await
            .map_err(|e| self.failed("evict_all", None, e))?;
        self.counters.evictions.fetch_add(removed, Ordering::Relaxed);
        tracing::debug!(region = %self.name, removed, "region evicted");
        Ok(removed)
    }

    pub(crate) fn record_hit(&self) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_put(&self) {
        self.counters.skipped_puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_conflict(&self) {
        self.counters.lock_conflicts.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct RegionCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    skipped_puts: AtomicU64,
    evictions: AtomicU64,
    lock_conflicts: AtomicU64,
}

impl RegionCounters {
    fn snapshot(&self) -> RegionStats {
        RegionStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            skipped_puts: self.skipped_puts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            lock_conflicts: self.lock_conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Per-region usage counters, local to this process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionStats {
    /// `get` calls that returned a value.
    pub hits: u64,
    /// `get` calls that returned nothing (absent, locked or not yet readable).
    pub misses: u64,
    /// Items written.
    pub puts: u64,
    /// `put_from_load` calls that declined to write.
    pub skipped_puts: u64,
    /// Slots removed by evict/remove.
    pub evictions: u64,
    /// Stale or contended lock handles that were absorbed.
    pub lock_conflicts: u64,
}

impl RegionStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
