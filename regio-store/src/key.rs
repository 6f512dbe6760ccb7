//! Region-scoped store keys.
//!
//! Every key a region writes is prefixed with the region name, so one store
//! can host many regions and a region can be evicted with a single prefix
//! delete. A `RegionScopedKey` cannot be built without naming its region.

/// Separator byte between the region name and the entity key.
///
/// `0xFF` never occurs in UTF-8, so the split is unambiguous.
const SEPARATOR: u8 = 0xFF;

/// A store key bound to one region.
///
/// # Binary Format
///
/// - region name (UTF-8)
/// - separator (0xFF)
/// - entity key (UTF-8)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionScopedKey {
    inner: RegionKeyInner,
}

/// Private inner struct - prevents external construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegionKeyInner {
    region: String,
    key: String,
}

impl RegionScopedKey {
    /// Create a new region-scoped key.
    pub fn new(region: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            inner: RegionKeyInner {
                region: region.into(),
                key: key.into(),
            },
        }
    }

    /// The region this key belongs to.
    pub fn region(&self) -> &str {
        &self.inner.region
    }

    /// The entity key within the region.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Encode to bytes for the store.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.inner.region.len() + 1 + self.inner.key.len());
        bytes.extend_from_slice(self.inner.region.as_bytes());
        bytes.push(SEPARATOR);
        bytes.extend_from_slice(self.inner.key.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if:
    /// - There is no separator byte
    /// - The region name is empty
    /// - Either part is not valid UTF-8
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.iter().position(|b| *b == SEPARATOR)?;
        if split == 0 {
            return None;
        }
        let region = std::str::from_utf8(&bytes[..split]).ok()?;
        let key = std::str::from_utf8(&bytes[split + 1..]).ok()?;
        Some(Self::new(region, key))
    }

    /// Prefix shared by every key of `region`.
    pub fn region_prefix(region: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(region.len() + 1);
        prefix.extend_from_slice(region.as_bytes());
        prefix.push(SEPARATOR);
        prefix
    }
}

impl std::fmt::Display for RegionScopedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.inner.region, self.inner.key)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Encoding then decoding returns the original key.
        #[test]
        fn prop_encode_decode_roundtrip(region in "[a-zA-Z0-9_.]{1,24}", key in "\\PC{0,40}") {
            let scoped = RegionScopedKey::new(region, key);
            let decoded = RegionScopedKey::decode(&scoped.encode());
            prop_assert_eq!(decoded, Some(scoped));
        }

        /// Decoding arbitrary bytes never panics.
        #[test]
        fn prop_decode_is_total(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = RegionScopedKey::decode(&bytes);
        }

        /// A key never matches the prefix of a different region.
        #[test]
        fn prop_prefix_isolation(
            a in "[a-z]{1,12}",
            b in "[a-z]{1,12}",
            key in "[a-z0-9:]{0,16}",
        ) {
            prop_assume!(a != b);
            let encoded = RegionScopedKey::new(a, key).encode();
            prop_assert!(!encoded.starts_with(&RegionScopedKey::region_prefix(&b)));
        }
    }
}
