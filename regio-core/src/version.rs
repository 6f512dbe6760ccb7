//! Entity versions as supplied by the persistence framework.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Optimistic-lock version of a cached entity.
///
/// The cache never interprets a version beyond ordering it against another
/// version of the same kind. Versions of different kinds are incomparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    /// Numeric version column (`@Version int/long`).
    Counter(i64),
    /// Timestamp version column.
    Timestamp(Timestamp),
}

impl Version {
    /// Returns true only if `self` is strictly older than `other`.
    ///
    /// Incomparable versions are never older.
    pub fn is_older_than(&self, other: &Version) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Less))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Version::Counter(a), Version::Counter(b)) => Some(a.cmp(b)),
            (Version::Timestamp(a), Version::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Counter(n) => write!(f, "v{n}"),
            Version::Timestamp(ts) => write!(f, "v@{}", ts.to_rfc3339()),
        }
    }
}

impl From<i64> for Version {
    fn from(n: i64) -> Self {
        Version::Counter(n)
    }
}

impl From<Timestamp> for Version {
    fn from(ts: Timestamp) -> Self {
        Version::Timestamp(ts)
    }
}

/// True when `existing` is known to be strictly older than `candidate`.
///
/// A missing version on either side is never "older".
pub fn is_version_older(existing: Option<&Version>, candidate: Option<&Version>) -> bool {
    match (existing, candidate) {
        (Some(existing), Some(candidate)) => existing.is_older_than(candidate),
        _ => false,
    }
}
