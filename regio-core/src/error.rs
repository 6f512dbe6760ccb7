//! Error types for regio operations

use thiserror::Error;

/// Failures reported by a store client.
///
/// These never reach callers of an access strategy directly: the region layer
/// wraps every one of them in [`AccessError::CacheOperationFailed`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization failed: {reason}")]
    Deserialization { reason: String },

    #[error("I/O error: {reason}")]
    Io { reason: String },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io {
            reason: e.to_string(),
        }
    }
}

/// Errors surfaced by region access strategies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Cache operation {operation} failed in region {region}: {source}")]
    CacheOperationFailed {
        region: String,
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Unsupported mutation: {operation} on read-only region {region}")]
    UnsupportedMutation {
        region: String,
        operation: &'static str,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all regio errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegioError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl RegioError {
    /// Returns true for the wrapped store failure kind.
    pub fn is_cache_operation_failed(&self) -> bool {
        matches!(
            self,
            RegioError::Access(AccessError::CacheOperationFailed { .. })
        )
    }

    /// Returns true when a read-only region rejected a mutation.
    pub fn is_unsupported_mutation(&self) -> bool {
        matches!(
            self,
            RegioError::Access(AccessError::UnsupportedMutation { .. })
        )
    }
}

/// Result type alias for store client operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for regio operations.
pub type RegioResult<T> = Result<T, RegioError>;

// =============================================================================
// TESTS
// =============================================================================
