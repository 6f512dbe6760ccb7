//! LMDB-backed store client.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped
//! key-value store. An LMDB environment can be opened by several processes at
//! once, so regions in different processes can share one store file the same
//! way they would share a remote key-value server.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`, `exists` and `stats`
//! - Write transactions for `set`, `delete` and `delete_prefix`
//! - Hit/miss counters are atomics

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use regio_core::{StoreError, StoreResult};

use crate::traits::{StoreClient, StoreStats};

fn txn_error(e: heed::Error) -> StoreError {
    StoreError::Transaction {
        reason: e.to_string(),
    }
}

/// LMDB-backed store client.
///
/// # Example
///
/// ```ignore
/// use regio_store::{LmdbStore, RegionScopedKey, StoreClient};
///
/// let store = LmdbStore::open("/tmp/regio", 100)?;
/// let key = RegionScopedKey::new("users", "user:1").encode();
/// store.set(&key, b"{}".to_vec()).await?;
/// ```
pub struct LmdbStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LmdbStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> StoreResult<Self> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per store value and the
        // memory map is never used after the store is dropped.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| StoreError::Unavailable {
            reason: format!("failed to open LMDB environment: {e}"),
        })?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| StoreError::Unavailable {
                reason: format!("failed to open database: {e}"),
            })?;
        wtxn.commit().map_err(txn_error)?;
        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "opened LMDB store");

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl StoreClient for LmdbStore {
    fn name(&self) -> &'static str {
        "lmdb"
    }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let value = self.db.get(&rtxn, key).map_err(txn_error)?.map(<[u8]>::to_vec);
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(value)
    }

    async fn set(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.put(&mut wtxn, key, &value).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)
    }

    async fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let deleted = self.db.delete(&mut wtxn, key).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted)
    }

    async fn exists(&self, key: &[u8]) -> StoreResult<bool> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        Ok(self.db.get(&rtxn, key).map_err(txn_error)?.is_some())
    }

    async fn delete_prefix(&self, prefix: &[u8]) -> StoreResult<u64> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;

        let doomed = {
            let mut keys = Vec::new();
            for result in self.db.prefix_iter(&wtxn, prefix).map_err(txn_error)? {
                let (key, _) = result.map_err(txn_error)?;
                keys.push(key.to_vec());
            }
            keys
        };

        let mut deleted = 0u64;
        for key in &doomed {
            if self.db.delete(&mut wtxn, key).map_err(txn_error)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_error)?;
        tracing::debug!(deleted, "LMDB prefix delete committed");

        Ok(deleted)
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_error)?;
        let mut value_bytes = 0u64;
        for result in self.db.iter(&rtxn).map_err(txn_error)? {
            let (_, value) = result.map_err(txn_error)?;
            value_bytes += value.len() as u64;
        }
        Ok(StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            value_bytes,
        })
    }
}
