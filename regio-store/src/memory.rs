//! In-process store backed by an ordered map.
//!
//! Useful for tests and for single-process deployments. Ordered storage keeps
//! prefix deletes to one range scan.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use regio_core::StoreResult;
use tokio::sync::RwLock;

use crate::traits::{StoreClient, StoreStats};

/// In-memory store client.
///
/// Uses tokio::sync::RwLock for safe async access.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Raw snapshot of every key, in order.
    pub async fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let value = self.entries.read().await.get(key).cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(value)
    }

    async fn set(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.entries.write().await.insert(key.to_vec(), value);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn delete_prefix(&self, prefix: &[u8]) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let doomed: Vec<Vec<u8>> = entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let entries = self.entries.read().await;
        Ok(StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            value_bytes: entries.values().map(|v| v.len() as u64).sum(),
        })
    }
}
