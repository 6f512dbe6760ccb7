//! Fuzz test for region-scoped key decoding
//!
//! Run with: cargo +nightly fuzz run key_decode_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use regio_store::RegionScopedKey;

fuzz_target!(|data: &[u8]| {
    if let Some(key) = RegionScopedKey::decode(data) {
        // A decoded key re-encodes to the exact input bytes.
        assert_eq!(key.encode(), data);
        assert!(!key.region().is_empty());
        assert!(data.starts_with(&RegionScopedKey::region_prefix(key.region())));
    }
});
