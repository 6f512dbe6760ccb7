//! Pass-through strategy for stores that take part in the database transaction.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use regio_core::{AccessType, RegioResult, Timestamp, Version};

use super::{put_loaded_value, read_value, EntityRegionAccess};
use crate::entry::CacheValue;
use crate::region::Region;
use crate::soft_lock::SoftLock;

/// Strategy that relies on the store following the database transaction.
///
/// Writes become visible immediately. No soft locks are kept, so a store
/// without transactional guarantees can briefly expose uncommitted state.
pub struct TransactionalAccess<V> {
    region: Arc<Region>,
    _value: PhantomData<fn() -> V>,
}

impl<V> TransactionalAccess<V> {
    pub fn new(region: Arc<Region>) -> Self {
        Self {
            region,
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for TransactionalAccess<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionalAccess")
            .field("region", &self.region.name())
            .finish()
    }
}

#[async_trait]
impl<V: CacheValue> EntityRegionAccess<V> for TransactionalAccess<V> {
    fn region(&self) -> &Region {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::Transactional
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
        Ok(None)
    }

    async fn unlock_item(&self, key: &str, _lock: Option<&SoftLock>) -> RegioResult<()> {
        tracing::trace!(region = %self.region.name(), key, "unlock_item");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regio_core::RegionConfig;
    use regio_store::InMemoryStore;
    use regio_test_utils::FailingStore;

    fn access() -> (TransactionalAccess<u64>, Arc<Region>) {
        let region = Arc::new(
            Region::new("balances", Arc::new(InMemoryStore::new()), RegionConfig::default())
                .expect("valid region"),
        );
        (TransactionalAccess::new(region.clone()), region)
    }

    #[tokio::test]
    async fn test_update_overwrites_immediately() {
        let (access, region) = access();
        assert!(access
            .insert("acct:1", 100, Some(Version::Counter(1)))
            .await
            .expect("insert"));
        assert!(access
            .update("acct:1", 80, Some(Version::Counter(2)), Some(Version::Counter(1)))
            .await
            .expect("update"));
        assert!(!access
            .after_update("acct:1", 80, Some(Version::Counter(2)), Some(Version::Counter(1)), None)
            .await
            .expect("after_update"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some(80)
        );

        let entry = region
            .get_entry::<u64>("acct:1", "test")
            .await
            .expect("get_entry")
            .expect("entry present");
        assert_eq!(
            entry.as_item().and_then(|item| item.version),
            Some(Version::Counter(2))
        );
    }

    #[tokio::test]
    async fn test_minimal_put_skips_existing_key() {
        let (access, region) = access();
        let ts = region.next_timestamp();
        assert!(access
            .put_from_load("acct:1", 1, ts, None, true)
            .await
            .expect("put"));
        assert!(!access
            .put_from_load("acct:1", 2, ts, None, true)
            .await
            .expect("put"));
        assert!(access
            .put_from_load("acct:1", 3, ts, None, false)
            .await
            .expect("put"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_lock_hooks_are_noops() {
        let (access, region) = access();
        access.insert("acct:1", 5, None).await.expect("insert");
        let lock = access.lock_item("acct:1", None).await.expect("lock_item");
        assert!(lock.is_none());
        access.unlock_item("acct:1", None).await.expect("unlock_item");
        assert!(!access
            .after_insert("acct:1", 5, None)
            .await
            .expect("after_insert"));
        assert_eq!(
            access.get("acct:1", region.next_timestamp()).await.expect("get"),
            Some(5)
        );
    }

    #[tokio::test]
    async fn test_every_store_failure_is_wrapped() {
        let store = Arc::new(FailingStore::new(InMemoryStore::new()));
        let region = Arc::new(
            Region::new("balances", store.clone(), RegionConfig::default()).expect("region"),
        );
        let access: TransactionalAccess<u64> = TransactionalAccess::new(region.clone());
        store.fail_all();
        let ts = region.next_timestamp();

        assert!(access
            .get("k", ts)
            .await
            .expect_err("get")
            .is_cache_operation_failed());
        assert!(access
            .put_from_load("k", 1, ts, None, true)
            .await
            .expect_err("put_from_load")
            .is_cache_operation_failed());
        assert!(access
            .insert("k", 1, None)
            .await
            .expect_err("insert")
            .is_cache_operation_failed());
        assert!(access
            .update("k", 1, None, None)
            .await
            .expect_err("update")
            .is_cache_operation_failed());
        assert!(access
            .remove("k")
            .await
            .expect_err("remove")
            .is_cache_operation_failed());
    }
}
