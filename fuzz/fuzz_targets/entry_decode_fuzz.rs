//! Fuzz test for stored cache entry decoding
//!
//! Value slots are shared by every process using the store, so a region may
//! read bytes written by another version or another program. Decoding must
//! fail cleanly, never panic.
//!
//! Run with: cargo +nightly fuzz run entry_decode_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use regio_access::CacheEntry;

fuzz_target!(|data: &[u8]| {
    if let Ok(entry) = CacheEntry::<serde_json::Value>::decode(data) {
        // Anything that decodes must re-encode and decode to the same entry.
        let bytes = entry.encode().expect("decoded entry should re-encode");
        let again = CacheEntry::<serde_json::Value>::decode(&bytes)
            .expect("re-encoded entry should decode");
        assert_eq!(again, entry);
        assert_eq!(entry.is_lock(), entry.as_item().is_none());
    }
});
