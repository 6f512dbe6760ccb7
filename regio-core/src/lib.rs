//! Regio Core - Shared Types
//!
//! Identity, time, version, soft-lock and configuration types plus the error
//! taxonomy. Every other regio crate depends on this one. This crate performs
//! no I/O.

pub mod config;
pub mod error;
pub mod identity;
pub mod lock;
pub mod version;

pub use config::{
    validate_region_name, AccessType, AccessTypeParseError, RegionConfig, DEFAULT_LOCK_TIMEOUT,
};
pub use error::{
    AccessError, ConfigError, RegioError, RegioResult, StoreError, StoreResult,
};
pub use identity::{
    new_lock_id, new_source_id, timestamp_after, LockId, SourceId, Timestamp, Timestamper,
};
pub use lock::LockRecord;
pub use version::{is_version_older, Version};
