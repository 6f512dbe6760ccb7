//! Identity and time types shared by every regio crate

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identity of one soft-lock generation on a key.
pub type LockId = Uuid;

/// Identity of the access-strategy instance (one per process and region) that
/// issued a soft lock.
pub type SourceId = Uuid;

/// Generate a new UUIDv7 lock id (timestamp-sortable).
pub fn new_lock_id() -> LockId {
    Uuid::now_v7()
}

/// Generate a new UUIDv7 source id.
pub fn new_source_id() -> SourceId {
    Uuid::now_v7()
}

/// Add a std duration to a timestamp, saturating at the far future.
pub fn timestamp_after(at: Timestamp, duration: Duration) -> Timestamp {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Strictly monotonic clock with microsecond resolution.
///
/// Every call to [`Timestamper::next`] returns a timestamp greater than any
/// previously returned by the same instance, even when the wall clock stalls
/// or steps backwards. Entry timestamps and transaction start times obtained
/// from the same region are therefore totally ordered.
#[derive(Debug, Default)]
pub struct Timestamper {
    last_micros: AtomicI64,
}

impl Timestamper {
    /// Create a new timestamper.
    pub const fn new() -> Self {
        Self {
            last_micros: AtomicI64::new(0),
        }
    }

    /// Return the next timestamp.
    pub fn next(&self) -> Timestamp {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last_micros.load(Ordering::Acquire);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self.last_micros.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return DateTime::from_timestamp_micros(candidate).unwrap_or_else(Utc::now)
                }
                Err(actual) => last = actual,
            }
        }
    }
}
