//! Fuzz target for security identifier decoding.
//!
//! SIDs arrive as raw bytes from the directory; decoding must reject
//! malformed input without panicking.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_sid_decode -- -max_total_time=600

#![no_main]

use dirsync_connector::sid::{decode_sid_string, SecurityIdentifier};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(sid) = SecurityIdentifier::decode(data) {
        let text = sid.to_string();
        assert!(text.starts_with("S-"));
        let _ = sid.rid();
    }

    if let Ok(text) = decode_sid_string(data) {
        assert!(text.starts_with("S-"));
    }
});
