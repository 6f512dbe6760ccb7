//! What a region stores in each key's value slot.
//!
//! A slot holds either a cached item or the soft-lock record that replaced
//! it. Both are encoded with serde_json so every process sharing the store
//! reads the same bookkeeping.

use regio_core::{is_version_older, LockRecord, StoreError, StoreResult, Timestamp, Version};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Marker trait for values that can be cached.
///
/// Implemented for every type that is cloneable, serde-serializable and
/// thread-safe.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A cached entity state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedItem<V> {
    pub value: V,
    pub version: Option<Version>,
    /// When the item was written, from the region's timestamper.
    pub timestamp: Timestamp,
}

impl<V> CachedItem<V> {
    /// Whether a transaction that started at `tx_timestamp` may see this item.
    pub fn is_readable(&self, tx_timestamp: Timestamp) -> bool {
        tx_timestamp > self.timestamp
    }

    /// Whether a load carrying `version` may replace this item.
    pub fn is_writeable(&self, version: Option<&Version>) -> bool {
        is_version_older(self.version.as_ref(), version)
    }
}

/// Contents of one value slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheEntry<V> {
    Item(CachedItem<V>),
    Lock(LockRecord),
}

impl<V> CacheEntry<V> {
    /// The item, if this slot is not locked.
    pub fn as_item(&self) -> Option<&CachedItem<V>> {
        match self {
            CacheEntry::Item(item) => Some(item),
            CacheEntry::Lock(_) => None,
        }
    }

    /// The lock record, if this slot is locked.
    pub fn as_lock(&self) -> Option<&LockRecord> {
        match self {
            CacheEntry::Item(_) => None,
            CacheEntry::Lock(lock) => Some(lock),
        }
    }

    pub fn is_lock(&self) -> bool {
        matches!(self, CacheEntry::Lock(_))
    }
}

impl<V: Serialize> CacheEntry<V> {
    /// Encode for the store.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })
    }
}

impl<V: DeserializeOwned> CacheEntry<V> {
    /// Decode bytes read from the store.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use regio_core::new_source_id;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_item_readable_only_after_write() {
        let now = Utc::now();
        let item = CachedItem {
            value: 1u32,
            version: None,
            timestamp: now,
        };
        assert!(!item.is_readable(now));
        assert!(!item.is_readable(now - TimeDelta::milliseconds(1)));
        assert!(item.is_readable(now + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_item_writeable_only_by_newer_version() {
        let item = CachedItem {
            value: "a".to_string(),
            version: Some(Version::Counter(3)),
            timestamp: Utc::now(),
        };
        assert!(item.is_writeable(Some(&Version::Counter(4))));
        assert!(!item.is_writeable(Some(&Version::Counter(3))));
        assert!(!item.is_writeable(None));
    }

    #[test]
    fn test_entry_encoding_is_tagged() {
        let entry = CacheEntry::Item(CachedItem {
            value: json!({"name": "A"}),
            version: Some(Version::Counter(1)),
            timestamp: Utc::now(),
        });
        let bytes = entry.encode().expect("encode");
        let raw: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(raw["kind"], "item");
        assert_eq!(raw["value"]["name"], "A");

        let decoded = CacheEntry::<serde_json::Value>::decode(&bytes).expect("decode");
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_lock_entry_decodes_as_lock() {
        let record = LockRecord::acquire(
            new_source_id(),
            1,
            None,
            Utc::now(),
            Duration::from_secs(5),
        );
        let bytes = CacheEntry::<String>::Lock(record.clone())
            .encode()
            .expect("encode");
        let decoded = CacheEntry::<String>::decode(&bytes).expect("decode");
        assert!(decoded.is_lock());
        assert_eq!(decoded.as_lock(), Some(&record));
        assert!(decoded.as_item().is_none());
    }

    #[test]
    fn test_garbage_fails_with_deserialization_error() {
        let err = CacheEntry::<String>::decode(b"\x00not json").expect_err("should fail");
        assert!(matches!(err, StoreError::Deserialization { .. }));
    }
}
