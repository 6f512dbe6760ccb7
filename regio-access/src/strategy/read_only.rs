//! Strategy for entities that never change once written.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use regio_core::{AccessError, AccessType, RegioError, RegioResult, Timestamp, Version};

use super::{put_loaded_value, read_value, EntityRegionAccess};
use crate::entry::CacheValue;
use crate::region::Region;
use crate::soft_lock::SoftLock;

/// Strategy for entities that never change once cached.
pub struct ReadOnlyAccess<V> {
    region: Arc<Region>,
    _value: PhantomData<fn() -> V>,
}

impl<V> ReadOnlyAccess<V> {
    pub fn new(region: Arc<Region>) -> Self {
        Self {
            region,
            _value: PhantomData,
        }
    }

    fn unsupported(&self, operation: &'static str) -> RegioError {
        tracing::warn!(
            region = %self.region.name(),
            operation,
            "mutation attempted on read-only region"
        );
        RegioError::Access(AccessError::UnsupportedMutation {
            region: self.region.name().to_string(),
            operation,
        })
    }
}

impl<V> fmt::Debug for ReadOnlyAccess<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyAccess")
            .field("region", &self.region.name())
            .finish()
    }
}

#[async_trait]
impl<V: CacheValue> EntityRegionAccess<V> for ReadOnlyAccess<V> {
    fn region(&self) -> &Region {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::ReadOnly
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
        _key: &str,
        _value: V,
        _current_version: Option<Version>,
        _previous_version: Option<Version>,
    ) -> RegioResult<bool> {
        Err(self.unsupported("update"))
    }

    async fn after_update(
        &self,
        _key: &str,
        _value: V,
        _current_version: Option<Version>,
        _previous_version: Option<Version>,
        _lock: Option<&SoftLock>,
    ) -> RegioResult<bool> {
        Err(self.unsupported("after_update"))
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
