//! Region configuration types

use crate::{ConfigError, RegioError, RegioResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// ACCESS TYPE
// ============================================================================

/// Concurrency strategy used by a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    /// Cached data is never mutated after insert.
    ReadOnly,
    /// Writes go straight to the store; short stale windows are accepted.
    NonstrictReadWrite,
    /// Soft locks hide values that are being written.
    ReadWrite,
    /// The store is trusted to follow the database transaction.
    Transactional,
}

impl AccessType {
    /// All access types, in declaration order.
    pub const ALL: [AccessType; 4] = [
        AccessType::ReadOnly,
        AccessType::NonstrictReadWrite,
        AccessType::ReadWrite,
        AccessType::Transactional,
    ];

    /// The external name used in mapping configuration.
    pub fn external_name(&self) -> &'static str {
        match self {
            AccessType::ReadOnly => "read-only",
            AccessType::NonstrictReadWrite => "nonstrict-read-write",
            AccessType::ReadWrite => "read-write",
            AccessType::Transactional => "transactional",
        }
    }

    /// Parse from the external name, ignoring case and `_`/`-` differences.
    pub fn from_external_name(s: &str) -> Result<Self, AccessTypeParseError> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "read-only" | "readonly" => Ok(AccessType::ReadOnly),
            "nonstrict-read-write" | "nonstrict" => Ok(AccessType::NonstrictReadWrite),
            "read-write" | "readwrite" => Ok(AccessType::ReadWrite),
            "transactional" => Ok(AccessType::Transactional),
            _ => Err(AccessTypeParseError(s.to_string())),
        }
    }

    /// Whether this strategy keeps soft-lock records in the store.
    pub fn uses_soft_locks(&self) -> bool {
        matches!(self, AccessType::ReadWrite)
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.external_name())
    }
}

impl FromStr for AccessType {
    type Err = AccessTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_external_name(s)
    }
}

/// Error when parsing an invalid access type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTypeParseError(pub String);

impl fmt::Display for AccessTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid access type: {}", self.0)
    }
}

impl std::error::Error for AccessTypeParseError {}

// ============================================================================
// REGION CONFIG
// ============================================================================

/// Default soft-lock lifetime.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Region-wide settings, fixed for the lifetime of a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Skip `put_from_load` writes when the key is already cached.
    pub minimal_puts: bool,
    /// How long a soft lock protects a key before it is considered abandoned.
    #[serde(with = "duration_millis")]
    pub lock_timeout: Duration,
    /// Strategy used when a mapping does not name one.
    pub default_access_type: AccessType,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            minimal_puts: false,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            default_access_type: AccessType::ReadWrite,
        }
    }
}

impl RegionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable minimal puts.
    pub fn with_minimal_puts(mut self, enabled: bool) -> Self {
        self.minimal_puts = enabled;
        self
    }

    /// Set the soft-lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the default access type.
    pub fn with_default_access_type(mut self, access_type: AccessType) -> Self {
        self.default_access_type = access_type;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> RegioResult<()> {
        if self.lock_timeout.is_zero() {
            return Err(RegioError::Config(ConfigError::InvalidValue {
                field: "lock_timeout".to_string(),
                value: format!("{:?}", self.lock_timeout),
                reason: "lock_timeout must be positive".to_string(),
            }));
        }
        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `REGIO_MINIMAL_PUTS`: `true`/`false` (default: false)
    /// - `REGIO_LOCK_TIMEOUT_MS`: soft-lock timeout in milliseconds (default: 60000)
    /// - `REGIO_DEFAULT_ACCESS_TYPE`: e.g. `read-write` (default: read-write)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            minimal_puts: lookup("REGIO_MINIMAL_PUTS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.minimal_puts),
            lock_timeout: lookup("REGIO_LOCK_TIMEOUT_MS")
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            default_access_type: lookup("REGIO_DEFAULT_ACCESS_TYPE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_access_type),
        }
    }
}

/// Validate a region name.
pub fn validate_region_name(name: &str) -> RegioResult<()> {
    if name.trim().is_empty() {
        return Err(RegioError::Config(ConfigError::MissingRequired {
            field: "region name".to_string(),
        }));
    }
    Ok(())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// =============================================================================
// TESTS
// =============================================================================
