//! Soft-lock records stored in a key's value slot.
//!
//! A soft lock never blocks anyone. It replaces the cached value while a
//! transaction is writing the entity, so readers fall through to the database
//! and loaders cannot publish a value that is about to become stale.
//!
//! # Lifecycle
//!
//! ```text
//! (item/empty) ── acquire ──→ held(m=1) ── join ──→ held(m=n, concurrent)
//!                                │                        │
//!                             release                  release ×n
//!                                ↓                        ↓
//!                          released(unlocked_at)   released(unlocked_at)
//!
//! any state ── now >= expires_at ──→ expired (treated as absent)
//! ```
//!
//! All bookkeeping lives in the record itself so writers in different
//! processes coordinate only through the store.

use crate::{
    identity::timestamp_after, is_version_older, new_lock_id, LockId, SourceId, Timestamp, Version,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Soft-lock state persisted in place of a cached item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Identity of this lock generation.
    pub lock_id: LockId,
    /// Strategy instance that opened the generation.
    pub owner: SourceId,
    /// Monotonic per-key counter, bumped on every acquire or join.
    pub epoch: u64,
    /// Number of holders that have not released yet.
    pub multiplicity: u32,
    /// Set once a second holder joined while the lock was held.
    pub concurrent: bool,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    /// When the last holder released, if it has.
    pub unlocked_at: Option<Timestamp>,
    /// Version of the item this lock replaced.
    pub version: Option<Version>,
}

impl LockRecord {
    /// Open a new lock generation with a single holder.
    pub fn acquire(
        owner: SourceId,
        epoch: u64,
        version: Option<Version>,
        now: Timestamp,
        timeout: Duration,
    ) -> Self {
        Self {
            lock_id: new_lock_id(),
            owner,
            epoch,
            multiplicity: 1,
            concurrent: false,
            acquired_at: now,
            expires_at: timestamp_after(now, timeout),
            unlocked_at: None,
            version,
        }
    }

    /// A generation that is already released but still hides the key until it
    /// expires. Used when a holder finds its own lock gone.
    pub fn released_until_expiry(
        owner: SourceId,
        epoch: u64,
        now: Timestamp,
        timeout: Duration,
    ) -> Self {
        let expires_at = timestamp_after(now, timeout);
        Self {
            lock_id: new_lock_id(),
            owner,
            epoch,
            multiplicity: 0,
            concurrent: false,
            acquired_at: now,
            expires_at,
            unlocked_at: Some(expires_at),
            version: None,
        }
    }

    /// Check if the lock has expired based on current time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Calculate remaining duration until expiry.
    pub fn remaining_duration(&self, now: Timestamp) -> Option<Duration> {
        if now >= self.expires_at {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }

    /// Whether any holder still owns the lock.
    pub fn is_held(&self) -> bool {
        self.multiplicity > 0
    }

    /// Add another holder. Returns the epoch assigned to the new holder.
    ///
    /// Joining a released lock makes the newcomer its only holder, so the
    /// lock is not marked concurrent.
    pub fn join(&mut self, now: Timestamp, timeout: Duration) -> u64 {
        self.concurrent = self.is_held();
        self.epoch += 1;
        self.multiplicity += 1;
        self.unlocked_at = None;
        self.expires_at = timestamp_after(now, timeout).max(self.expires_at);
        self.epoch
    }

    /// Drop one holder. The lock records the release time when the last
    /// holder leaves.
    pub fn release(&mut self, now: Timestamp) {
        self.multiplicity = self.multiplicity.saturating_sub(1);
        if self.multiplicity == 0 {
            self.unlocked_at = Some(now);
        }
    }

    /// Whether a handle with `lock_id`/`epoch` belongs to this generation.
    pub fn is_held_by(&self, lock_id: LockId, epoch: u64) -> bool {
        self.lock_id == lock_id && epoch <= self.epoch
    }

    /// Whether a load that started at `tx_timestamp` with `version` may replace
    /// this lock with a fresh item.
    pub fn is_writeable(&self, tx_timestamp: Timestamp, version: Option<&Version>) -> bool {
        if tx_timestamp >= self.expires_at {
            return true;
        }
        if self.is_held() {
            return false;
        }
        match self.version.as_ref() {
            None => self
                .unlocked_at
                .map(|unlocked_at| tx_timestamp > unlocked_at)
                .unwrap_or(false),
            Some(locked_version) => is_version_older(Some(locked_version), version),
        }
    }
}
