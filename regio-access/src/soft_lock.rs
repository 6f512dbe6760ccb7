//! Handles returned by `lock_item`.

use regio_core::{LockId, LockRecord, SourceId, Timestamp};
use serde::{Deserialize, Serialize};

/// Proof that the caller joined a soft-lock generation on a key.
///
/// The handle is just a claim; the lock itself lives in the store. A handle
/// only has an effect while the stored record it names is still there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoftLock {
    pub key: String,
    pub lock_id: LockId,
    /// Epoch assigned to this holder when it acquired or joined.
    pub epoch: u64,
    /// Strategy instance that took the lock.
    pub owner: SourceId,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl SoftLock {
    pub(crate) fn for_record(
        key: &str,
        record: &LockRecord,
        epoch: u64,
        owner: SourceId,
        acquired_at: Timestamp,
    ) -> Self {
        Self {
            key: key.to_string(),
            lock_id: record.lock_id,
            epoch,
            owner,
            acquired_at,
            expires_at: record.expires_at,
        }
    }

    /// Whether this handle names the generation in `record`.
    pub fn matches(&self, record: &LockRecord) -> bool {
        record.is_held_by(self.lock_id, self.epoch)
    }

    /// Whether the lock has outlived its timeout as of `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use regio_core::new_source_id;
    use std::time::Duration;

    #[test]
    fn test_handle_matches_its_generation_only() {
        let now = Utc::now();
        let owner = new_source_id();
        let mut record = LockRecord::acquire(owner, 1, None, now, Duration::from_secs(10));
        let first = SoftLock::for_record("k", &record, 1, owner, now);
        assert!(first.matches(&record));
        assert_eq!(first.expires_at, record.expires_at);

        let second_epoch = record.join(now, Duration::from_secs(10));
        let second = SoftLock::for_record("k", &record, second_epoch, new_source_id(), now);
        assert!(first.matches(&record));
        assert!(second.matches(&record));

        let replacement = LockRecord::acquire(owner, 3, None, now, Duration::from_secs(10));
        assert!(!first.matches(&replacement));
    }

    #[test]
    fn test_handle_expiry() {
        let now = Utc::now();
        let owner = new_source_id();
        let record = LockRecord::acquire(owner, 1, None, now, Duration::from_secs(1));
        let handle = SoftLock::for_record("k", &record, 1, owner, now);
        assert!(!handle.is_expired(now));
        assert!(handle.is_expired(record.expires_at));
    }
}
