//! Soft-locking strategy.
//!
//! While an entity is being written, its value slot holds a [`LockRecord`]
//! instead of the item. Readers see a miss and go to the database; loaders
//! may not publish over a held lock. The writer's completion call replaces
//! the lock with the new item, but only if its handle still names the current
//! lock generation and nobody else joined it in the meantime.
//!
//! Every decision is made from what is in the store, so writers in different
//! processes coordinate without sharing memory. Each decision is a read
//! followed by a write; the store offers no compare-and-set, so two writers
//! racing on the same key can still interleave between those two calls.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use regio_core::{
    new_source_id, AccessType, LockRecord, RegioResult, SourceId, Timestamp, Version,
};

use super::EntityRegionAccess;
use crate::entry::{CacheEntry, CacheValue};
use crate::region::Region;
use crate::soft_lock::SoftLock;

/// Strategy that hides in-flight writes behind soft locks.
pub struct ReadWriteAccess<V> {
    region: Arc<Region>,
    /// Identifies locks opened by this instance.
    source: SourceId,
    _value: PhantomData<fn() -> V>,
}

impl<V> ReadWriteAccess<V> {
    pub fn new(region: Arc<Region>) -> Self {
        Self {
            region,
            source: new_source_id(),
            _value: PhantomData,
        }
    }

    /// Identity recorded as `owner` on locks this instance opens.
    pub fn source(&self) -> SourceId {
        self.source
    }
}

impl<V> fmt::Debug for ReadWriteAccess<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadWriteAccess")
            .field("region", &self.region.name())
            .field("source", &self.source)
            .finish()
    }
}

impl<V: CacheValue> ReadWriteAccess<V> {
    /// A handle that no longer names the stored lock was presented.
    ///
    /// A live lock owned by someone else is left alone. Anything else in the
    /// slot is replaced by an already-released lock so the key stays hidden
    /// until the timeout passes and the next load repopulates it.
    async fn handle_lock_expiry(
        &self,
        key: &str,
        entry: Option<CacheEntry<V>>,
        now: Timestamp,
        operation: &'static str,
    ) -> RegioResult<()> {
        self.region.record_lock_conflict();
        let previous_epoch = match entry {
            Some(CacheEntry::Lock(record)) if !record.is_expired(now) => {
                tracing::debug!(
                    region = %self.region.name(),
                    key,
                    operation,
                    lock_id = %record.lock_id,
                    epoch = record.epoch,
                    "stale soft-lock handle, newer lock left in place"
                );
                return Ok(());
            }
            Some(CacheEntry::Lock(record)) => record.epoch,
            Some(CacheEntry::Item(_)) | None => 0,
        };

        tracing::debug!(
            region = %self.region.name(),
            key,
            operation,
            "soft lock lost, hiding key until timeout"
        );
        let record = LockRecord::released_until_expiry(
            self.source,
            previous_epoch + 1,
            now,
            self.region.lock_timeout(),
        );
        self.region
            .put_entry::<V>(key, &CacheEntry::Lock(record), operation)
            .await
    }
}

#[async_trait]
impl<V: CacheValue> EntityRegionAccess<V> for ReadWriteAccess<V> {
    fn region(&self) -> &Region {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::ReadWrite
    }

    async fn get(&self, key: &str, tx_timestamp: Timestamp) -> RegioResult<Option<V>> {
        tracing::trace!(region = %self.region.name(), key, "get");
        match self.region.get_entry::<V>(key, "get").await? {
            Some(CacheEntry::Item(item)) if item.is_readable(tx_timestamp) => {
                self.region.record_hit();
                Ok(Some(item.value))
            }
            _ => {
                self.region.record_miss();
                Ok(None)
            }
        }
    }

    async fn put_from_load(
        &self,
        key: &str,
        value: V,
        tx_timestamp: Timestamp,
        version: Option<Version>,
        minimal_put_override: bool,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, minimal_put_override, "put_from_load");
        let entry = self.region.get_entry::<V>(key, "put_from_load").await?;

        let writeable = match &entry {
            Some(_) if minimal_put_override => false,
            None => true,
            Some(CacheEntry::Item(item)) => item.is_writeable(version.as_ref()),
            Some(CacheEntry::Lock(record)) => record.is_writeable(tx_timestamp, version.as_ref()),
        };
        if !writeable {
            self.region.record_skipped_put();
            tracing::debug!(
                region = %self.region.name(),
                key,
                locked = entry.as_ref().is_some_and(CacheEntry::is_lock),
                "put_from_load skipped"
            );
            return Ok(false);
        }

        self.region
            .put_item(key, value, version, "put_from_load")
            .await?;
        Ok(true)
    }

    async fn insert(&self, key: &str, _value: V, _version: Option<Version>) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "insert");
        Ok(false)
    }

    async fn after_insert(
        &self,
        key: &str,
        value: V,
        version: Option<Version>,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "after_insert");
        let now = self.region.next_timestamp();
        let vacant = match self.region.get_entry::<V>(key, "after_insert").await? {
            None => true,
            Some(CacheEntry::Lock(record)) => record.is_expired(now),
            Some(CacheEntry::Item(_)) => false,
        };
        if !vacant {
            return Ok(false);
        }
        self.region
            .put_item(key, value, version, "after_insert")
            .await?;
        Ok(true)
    }

    async fn update(
        &self,
        key: &str,
        _value: V,
        _current_version: Option<Version>,
        _previous_version: Option<Version>,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "update");
        Ok(false)
    }

    async fn after_update(
        &self,
        key: &str,
        value: V,
        current_version: Option<Version>,
        _previous_version: Option<Version>,
        lock: Option<&SoftLock>,
    ) -> RegioResult<bool> {
        tracing::trace!(region = %self.region.name(), key, "after_update");
        let now = self.region.next_timestamp();
        let entry = self.region.get_entry::<V>(key, "after_update").await?;

        let (mut record, handle) = match (entry, lock) {
            (Some(CacheEntry::Lock(record)), Some(handle)) if handle.matches(&record) => {
                (record, handle)
            }
            (entry, _) => {
                self.handle_lock_expiry(key, entry, now, "after_update")
                    .await?;
                return Ok(false);
            }
        };

        if record.is_held() && !record.concurrent && record.epoch == handle.epoch {
            self.region
                .put_item(key, value, current_version, "after_update")
                .await?;
            return Ok(true);
        }

        record.release(now);
        self.region.record_lock_conflict();
        tracing::debug!(
            region = %self.region.name(),
            key,
            lock_id = %record.lock_id,
            epoch = handle.epoch,
            remaining = record.multiplicity,
            "contended soft lock, update not cached"
        );
        self.region
            .put_entry::<V>(key, &CacheEntry::Lock(record), "after_update")
            .await?;
        Ok(false)
    }

    async fn remove(&self, key: &str) -> RegioResult<()> {
        tracing::trace!(region = %self.region.name(), key, "remove");
        self.region.evict(key, "remove").await.map(|_| ())
    }

    async fn lock_item(
        &self,
        key: &str,
        version: Option<Version>,
    ) -> RegioResult<Option<SoftLock>> {
        tracing::trace!(region = %self.region.name(), key, "lock_item");
        let now = self.region.next_timestamp();
        let timeout = self.region.lock_timeout();

        let (record, epoch) = match self.region.get_entry::<V>(key, "lock_item").await? {
            Some(CacheEntry::Lock(mut record)) if record.is_held() && !record.is_expired(now) => {
                let epoch = record.join(now, timeout);
                tracing::debug!(
                    region = %self.region.name(),
                    key,
                    lock_id = %record.lock_id,
                    epoch,
                    multiplicity = record.multiplicity,
                    "joined live soft lock"
                );
                (record, epoch)
            }
            // Released or expired: open a new generation.
            Some(CacheEntry::Lock(previous)) => {
                let record = LockRecord::acquire(
                    self.source,
                    previous.epoch + 1,
                    version.or(previous.version),
                    now,
                    timeout,
                );
                let epoch = record.epoch;
                (record, epoch)
            }
            Some(CacheEntry::Item(item)) => {
                (LockRecord::acquire(self.source, 1, item.version, now, timeout), 1)
            }
            None => (LockRecord::acquire(self.source, 1, version, now, timeout), 1),
        };

        let handle = SoftLock::for_record(key, &record, epoch, self.source, now);
        self.region
            .put_entry::<V>(key, &CacheEntry::Lock(record), "lock_item")
            .await?;
        Ok(Some(handle))
    }

    async fn unlock_item(&self, key: &str, lock: Option<&SoftLock>) -> RegioResult<()> {
        tracing::trace!(region = %self.region.name(), key, "unlock_item");
        let now = self.region.next_timestamp();
        match (self.region.get_entry::<V>(key, "unlock_item").await?, lock) {
            (Some(CacheEntry::Lock(mut record)), Some(handle)) if handle.matches(&record) => {
                record.release(now);
                self.region
                    .put_entry::<V>(key, &CacheEntry::Lock(record), "unlock_item")
                    .await
            }
            (entry, _) => self.handle_lock_expiry(key, entry, now, "unlock_item").await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regio_core::RegionConfig;
    use regio_store::InMemoryStore;
    use std::time::Duration;

    fn region_with_timeout(timeout: Duration) -> Arc<Region> {
        Arc::new(
            Region::new(
                "accounts",
                Arc::new(InMemoryStore::new()),
                RegionConfig::new().with_lock_timeout(timeout),
            )
            .expect("valid region"),
        )
    }

    fn access() -> (ReadWriteAccess<String>, Arc<Region>) {
        let region = region_with_timeout(Duration::from_secs(60));
        (ReadWriteAccess::new(region.clone()), region)
    }

    async fn stored_lock(region: &Region, key: &str) -> LockRecord {
        region
            .get_entry::<String>(key, "test")
            .await
            .expect("get_entry")
            .and_then(|entry| entry.as_lock().cloned())
            .expect("slot should hold a lock")
    }

    #[tokio::test]
    async fn test_insert_is_deferred_to_after_insert() {
        let (access, region) = access();
        assert!(!access
            .insert("acct:1", "open".to_string(), Some(Version::Counter(1)))
            .await
            .expect("insert"));
        assert!(!region.contains("acct:1", "test").await.expect("contains"));

        assert!(access
            .after_insert("acct:1", "open".to_string(), Some(Version::Counter(1)))
            .await
            .expect("after_insert"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some("open".to_string())
        );
    }

    #[tokio::test]
    async fn test_after_insert_does_not_overwrite_existing_item() {
        let (access, region) = access();
        access
            .after_insert("acct:1", "first".to_string(), None)
            .await
            .expect("after_insert");
        assert!(!access
            .after_insert("acct:1", "second".to_string(), None)
            .await
            .expect("after_insert"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some("first".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_hides_items_newer_than_transaction() {
        let (access, region) = access();
        let before = region.next_timestamp();
        access
            .after_insert("acct:1", "open".to_string(), None)
            .await
            .expect("after_insert");
        assert_eq!(access.get("acct:1", before).await.expect("get"), None);
        assert!(access
            .get("acct:1", region.next_timestamp())
            .await
            .expect("get")
            .is_some());
    }

    #[tokio::test]
    async fn test_lock_forces_miss_and_after_update_publishes() {
        let (access, region) = access();
        access
            .after_insert("acct:9", "100".to_string(), Some(Version::Counter(1)))
            .await
            .expect("after_insert");

        let lock = access
            .lock_item("acct:9", Some(Version::Counter(1)))
            .await
            .expect("lock_item")
            .expect("read-write always hands out a lock");
        assert_eq!(lock.epoch, 1);
        assert_eq!(lock.owner, access.source());
        assert_eq!(access.get("acct:9", region.next_timestamp()).await.expect("get"), None);
        assert!(!access
            .update(
                "acct:9",
                "80".to_string(),
                Some(Version::Counter(2)),
                Some(Version::Counter(1)),
            )
            .await
            .expect("update"));

        assert!(access
            .after_update(
                "acct:9",
                "80".to_string(),
                Some(Version::Counter(2)),
                Some(Version::Counter(1)),
                Some(&lock),
            )
            .await
            .expect("after_update"));
        assert_eq!(
            access.get("acct:9", region.next_timestamp()).await.expect("get"),
            Some("80".to_string())
        );
    }

    #[tokio::test]
    async fn test_lock_on_item_keeps_item_version() {
        let (access, region) = access();
        access
            .after_insert("acct:1", "x".to_string(), Some(Version::Counter(7)))
            .await
            .expect("after_insert");
        access.lock_item("acct:1", None).await.expect("lock_item");
        assert_eq!(stored_lock(&region, "acct:1").await.version, Some(Version::Counter(7)));
    }

    #[tokio::test]
    async fn test_put_from_load_blocked_by_held_lock() {
        let (access, region) = access();
        let lock = access
            .lock_item("acct:1", Some(Version::Counter(1)))
            .await
            .expect("lock_item");
        assert!(lock.is_some());

        let written = access
            .put_from_load(
                "acct:1",
                "stale".to_string(),
                region.next_timestamp(),
                Some(Version::Counter(5)),
                false,
            )
            .await
            .expect("put_from_load");
        assert!(!written);
        assert!(stored_lock(&region, "acct:1").await.is_held());
    }

    #[tokio::test]
    async fn test_put_from_load_after_release_needs_newer_version() {
        let (access, region) = access();
        let lock = access
            .lock_item("acct:1", Some(Version::Counter(1)))
            .await
            .expect("lock_item");
        access
            .unlock_item("acct:1", lock.as_ref())
            .await
            .expect("unlock_item");

        let ts = region.next_timestamp();
        assert!(!access
            .put_from_load("acct:1", "same".to_string(), ts, Some(Version::Counter(1)), false)
            .await
            .expect("put"));
        assert!(access
            .put_from_load("acct:1", "newer".to_string(), ts, Some(Version::Counter(2)), false)
            .await
            .expect("put"));
    }

    #[tokio::test]
    async fn test_put_from_load_replaces_only_older_items() {
        let (access, region) = access();
        let ts = region.next_timestamp();
        assert!(access
            .put_from_load("acct:1", "v2".to_string(), ts, Some(Version::Counter(2)), false)
            .await
            .expect("put"));
        assert!(!access
            .put_from_load("acct:1", "v1".to_string(), ts, Some(Version::Counter(1)), false)
            .await
            .expect("put"));
        assert!(access
            .put_from_load("acct:1", "v3".to_string(), ts, Some(Version::Counter(3)), false)
            .await
            .expect("put"));
        assert!(!access
            .put_from_load("acct:1", "v4".to_string(), ts, Some(Version::Counter(4)), true)
            .await
            .expect("put"));
    }

    #[tokio::test]
    async fn test_second_writer_joins_and_first_cannot_publish() {
        let region = region_with_timeout(Duration::from_secs(60));
        let writer_a = ReadWriteAccess::<String>::new(region.clone());
        let writer_b = ReadWriteAccess::<String>::new(region.clone());

        let lock_a = writer_a
            .lock_item("acct:1", Some(Version::Counter(1)))
            .await
            .expect("lock_item")
            .expect("lock");
        let lock_b = writer_b
            .lock_item("acct:1", Some(Version::Counter(1)))
            .await
            .expect("lock_item")
            .expect("lock");
        assert_eq!(lock_a.epoch, 1);
        assert_eq!(lock_b.epoch, 2);
        assert_eq!(lock_a.lock_id, lock_b.lock_id);

        assert!(!writer_a
            .after_update(
                "acct:1",
                "from-a".to_string(),
                Some(Version::Counter(2)),
                None,
                Some(&lock_a),
            )
            .await
            .expect("after_update"));
        assert!(!writer_b
            .after_update(
                "acct:1",
                "from-b".to_string(),
                Some(Version::Counter(3)),
                None,
                Some(&lock_b),
            )
            .await
            .expect("after_update"));

        assert_eq!(writer_a.get("acct:1", region.next_timestamp()).await.expect("get"), None);
        let record = stored_lock(&region, "acct:1").await;
        assert!(!record.is_held());
        assert_eq!(region.stats().lock_conflicts, 2);
    }

    #[tokio::test]
    async fn test_stale_handle_never_releases_newer_lock() {
        let region = region_with_timeout(Duration::from_millis(200));
        let access = ReadWriteAccess::<String>::new(region.clone());

        let stale = access
            .lock_item("acct:1", None)
            .await
            .expect("lock_item")
            .expect("lock");
        tokio::time::sleep(Duration::from_millis(250)).await;

        let fresh = access
            .lock_item("acct:1", None)
            .await
            .expect("lock_item")
            .expect("lock");
        assert_ne!(fresh.lock_id, stale.lock_id);
        assert_eq!(fresh.epoch, stale.epoch + 1);

        access
            .unlock_item("acct:1", Some(&stale))
            .await
            .expect("unlock_item");
        assert!(!access
            .after_update("acct:1", "late".to_string(), None, None, Some(&stale))
            .await
            .expect("after_update"));

        let record = stored_lock(&region, "acct:1").await;
        assert_eq!(record.lock_id, fresh.lock_id);
        assert!(record.is_held());
        assert!(access
            .after_update("acct:1", "current".to_string(), None, None, Some(&fresh))
            .await
            .expect("after_update"));
    }

    #[tokio::test]
    async fn test_expired_lock_treated_as_absent() {
        let region = region_with_timeout(Duration::from_millis(30));
        let access = ReadWriteAccess::<String>::new(region.clone());
        access.lock_item("acct:1", None).await.expect("lock_item");
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(access.get("acct:1", region.next_timestamp()).await.expect("get"), None);
        assert!(access
            .put_from_load("acct:1", "reloaded".to_string(), region.next_timestamp(), None, false)
            .await
            .expect("put_from_load"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some("reloaded".to_string())
        );
    }

    #[tokio::test]
    async fn test_lost_lock_hides_key_until_timeout() {
        let (access, region) = access();
        let lock = access
            .lock_item("acct:1", None)
            .await
            .expect("lock_item")
            .expect("lock");
        access.remove("acct:1").await.expect("remove");
        access
            .after_insert("acct:1", "someone-else".to_string(), None)
            .await
            .expect("after_insert");

        assert!(!access
            .after_update("acct:1", "mine".to_string(), None, None, Some(&lock))
            .await
            .expect("after_update"));
        let record = stored_lock(&region, "acct:1").await;
        assert!(!record.is_held());
        assert_eq!(record.epoch, 1);
        assert!(!access
            .put_from_load("acct:1", "load".to_string(), region.next_timestamp(), None, false)
            .await
            .expect("put_from_load"));
    }

    #[tokio::test]
    async fn test_remove_wins_over_held_lock() {
        let (access, region) = access();
        access.lock_item("acct:1", None).await.expect("lock_item");
        access.remove("acct:1").await.expect("remove");
        assert!(!region.contains("acct:1", "test").await.expect("contains"));
    }

    #[tokio::test]
    async fn test_unlock_without_handle_does_not_block_next_writer() {
        let (access, region) = access();
        access.unlock_item("acct:1", None).await.expect("unlock_item");
        assert!(!stored_lock(&region, "acct:1").await.is_held());
        assert_eq!(region.stats().lock_conflicts, 1);

        let lock = access
            .lock_item("acct:1", None)
            .await
            .expect("lock_item")
            .expect("lock");
        let record = stored_lock(&region, "acct:1").await;
        assert_eq!(record.multiplicity, 1);
        assert!(!record.concurrent);
        assert!(access
            .after_update("acct:1", "fresh".to_string(), None, None, Some(&lock))
            .await
            .expect("after_update"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some("fresh".to_string())
        );
    }

    #[tokio::test]
    async fn test_writer_after_rollback_publishes() {
        let (access, region) = access();
        access
            .after_insert("acct:1", "100".to_string(), Some(Version::Counter(1)))
            .await
            .expect("after_insert");

        let rolled_back = access
            .lock_item("acct:1", Some(Version::Counter(1)))
            .await
            .expect("lock_item")
            .expect("lock");
        access
            .unlock_item("acct:1", Some(&rolled_back))
            .await
            .expect("unlock_item");

        let lock = access
            .lock_item("acct:1", Some(Version::Counter(1)))
            .await
            .expect("lock_item")
            .expect("lock");
        assert_ne!(lock.lock_id, rolled_back.lock_id);
        assert_eq!(lock.epoch, rolled_back.epoch + 1);
        let record = stored_lock(&region, "acct:1").await;
        assert_eq!(record.multiplicity, 1);
        assert!(!record.concurrent);
        assert_eq!(record.version, Some(Version::Counter(1)));

        assert!(access
            .after_update(
                "acct:1",
                "90".to_string(),
                Some(Version::Counter(2)),
                Some(Version::Counter(1)),
                Some(&lock),
            )
            .await
            .expect("after_update"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some("90".to_string())
        );
        assert_eq!(region.stats().lock_conflicts, 0);
    }
}
