//! Regio Test Utilities
//!
//! Shared test infrastructure for the regio workspace:
//! - A store wrapper that fails on demand
//! - Proptest generators for keys, values and versions
//! - Fixtures for common region setups
//! - Assertions on the error taxonomy

pub use regio_core::{
    AccessError, AccessType, RegionConfig, RegioError, RegioResult, StoreError, StoreResult,
    Timestamp, Version,
};
pub use regio_store::{InMemoryStore, StoreClient, StoreStats};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// FAILURE INJECTION
// ============================================================================

/// Store wrapper whose calls can be made to fail.
///
/// While failing, every call returns [`StoreError::Unavailable`] without
/// touching the inner store.
#[derive(Debug, Default)]
pub struct FailingStore<S> {
    inner: S,
    failing: AtomicBool,
    rejected: AtomicU64,
}

impl<S: StoreClient> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            rejected: AtomicU64::new(0),
        }
    }

    /// Make every following call fail.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Stop failing.
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    /// Number of calls rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, operation: &str) -> StoreResult<()> {
        if self.is_failing() {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable {
                reason: format!("injected failure on {operation}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<S: StoreClient> StoreClient for FailingStore<S> {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.check("get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.check("set")?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        self.check("delete")?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &[u8]) -> StoreResult<bool> {
        self.check("exists")?;
        self.inner.exists(key).await
    }

    async fn delete_prefix(&self, prefix: &[u8]) -> StoreResult<u64> {
        self.check("delete_prefix")?;
        self.inner.delete_prefix(prefix).await
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.check("stats")?;
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache keys, values and versions.

    use super::*;
    use proptest::prelude::*;

    /// Generate a region name.
    pub fn arb_region_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_.]{0,20}".prop_map(|s| s)
    }

    /// Generate an entity key, including characters that need no escaping.
    pub fn arb_entity_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:#_-]{1,40}".prop_map(|s| s)
    }

    /// Generate any string, including ones that are not valid keys elsewhere.
    pub fn arb_any_key() -> impl Strategy<Value = String> {
        any::<String>()
    }

    /// Generate a timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a version of either kind.
    pub fn arb_version() -> impl Strategy<Value = Version> {
        prop_oneof![
            (0i64..1_000_000).prop_map(Version::Counter),
            arb_timestamp().prop_map(Version::Timestamp),
        ]
    }

    /// Generate a counter version.
    pub fn arb_counter_version() -> impl Strategy<Value = Version> {
        (0i64..1_000_000).prop_map(Version::Counter)
    }

    /// Generate a JSON entity state.
    pub fn arb_json_value() -> impl Strategy<Value = serde_json::Value> {
        (
            "[a-zA-Z ]{0,30}".prop_map(|s| s),
            any::<i64>(),
            any::<bool>(),
            prop::collection::vec("[a-z]{1,8}".prop_map(|s| s), 0..4),
        )
            .prop_map(|(name, balance, active, tags)| {
                serde_json::json!({
                    "name": name,
                    "balance": balance,
                    "active": active,
                    "tags": tags,
                })
            })
    }

    /// Generate an access type.
    pub fn arb_access_type() -> impl Strategy<Value = AccessType> {
        prop_oneof![
            Just(AccessType::ReadOnly),
            Just(AccessType::NonstrictReadWrite),
            Just(AccessType::ReadWrite),
            Just(AccessType::Transactional),
        ]
    }

    /// Generate a valid region configuration.
    pub fn arb_region_config() -> impl Strategy<Value = RegionConfig> {
        (any::<bool>(), 1u64..120_000, arb_access_type()).prop_map(
            |(minimal_puts, timeout_ms, access_type)| {
                RegionConfig::new()
                    .with_minimal_puts(minimal_puts)
                    .with_lock_timeout(Duration::from_millis(timeout_ms))
                    .with_default_access_type(access_type)
            },
        )
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Common store and configuration setups.

    use super::*;

    /// Empty in-memory store behind a trait object.
    pub fn memory_store() -> Arc<dyn StoreClient> {
        Arc::new(InMemoryStore::new())
    }

    /// Empty in-memory store that can be switched to failing.
    pub fn failing_store() -> Arc<FailingStore<InMemoryStore>> {
        Arc::new(FailingStore::new(InMemoryStore::new()))
    }

    /// Config with minimal puts enabled.
    pub fn minimal_puts_config() -> RegionConfig {
        RegionConfig::new().with_minimal_puts(true)
    }

    /// Config whose soft locks expire quickly enough to wait out in a test.
    pub fn short_lock_config() -> RegionConfig {
        RegionConfig::new().with_lock_timeout(Duration::from_millis(50))
    }

    /// The JSON state used by the end-to-end scenarios.
    pub fn named(name: &str) -> serde_json::Value {
        serde_json::json!({ "name": name })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the regio error taxonomy.

    use super::*;

    /// Assert that a result is a wrapped store failure for `operation`.
    pub fn assert_cache_operation_failed<T: std::fmt::Debug>(
        result: &RegioResult<T>,
        operation: &str,
    ) {
        match result {
            Err(RegioError::Access(AccessError::CacheOperationFailed {
                operation: actual, ..
            })) => assert_eq!(*actual, operation, "wrong operation in {result:?}"),
            other => panic!("Expected CacheOperationFailed for {operation}, got: {other:?}"),
        }
    }

    /// Assert that a result is an unsupported mutation.
    pub fn assert_unsupported_mutation<T: std::fmt::Debug>(result: &RegioResult<T>) {
        assert!(
            matches!(
                result,
                Err(RegioError::Access(AccessError::UnsupportedMutation { .. }))
            ),
            "Expected UnsupportedMutation, got: {result:?}"
        );
    }
}
