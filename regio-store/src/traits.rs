//! Store client contract.
//!
//! The access strategies treat the key-value store as an opaque remote
//! service. Anything that can get, set, delete and probe single keys can back
//! a region.

use async_trait::async_trait;
use regio_core::StoreResult;

/// Key-value store consumed by cache regions.
///
/// Implementations must be safe to share between every concurrent caller of
/// every region. Each operation is atomic for its single key only; no
/// ordering between keys or between processes is assumed beyond
/// last-write-wins on `set`.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// A short backend label for logs ("memory", "lmdb", ...).
    fn name(&self) -> &'static str;

    /// Read the value stored under `key`.
    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()>;

    /// Delete `key`. Returns whether a value was present.
    async fn delete(&self, key: &[u8]) -> StoreResult<bool>;

    /// Check whether `key` holds a value.
    async fn exists(&self, key: &[u8]) -> StoreResult<bool>;

    /// Delete every key starting with `prefix`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &[u8]) -> StoreResult<u64>;

    /// Usage counters.
    async fn stats(&self) -> StoreResult<StoreStats>;
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of `get` calls that found a value.
    pub hits: u64,
    /// Number of `get` calls that found nothing.
    pub misses: u64,
    /// Number of entries currently stored.
    pub entry_count: u64,
    /// Approximate size of stored values in bytes.
    pub value_bytes: u64,
}

impl StoreStats {
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
