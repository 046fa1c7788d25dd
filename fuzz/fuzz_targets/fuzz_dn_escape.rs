//! Fuzz target for DN and filter escaping.
//!
//! Escaped CNs must never contain an unescaped comma and escaped filter
//! values must never contain filter metacharacters.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_dn_escape -- -max_total_time=600

#![no_main]

use dirsync_connector_ldap::dn::{
    dn_equals, escape_cn, escape_filter_value, group_name, normalize_dn, split_dn,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let escaped = escape_cn(s);
    assert_eq!(split_dn(&escaped).len(), 1);

    let filter = escape_filter_value(s);
    assert!(!filter.contains('(') && !filter.contains(')') && !filter.contains('*'));

    let _ = normalize_dn(s);
    assert!(dn_equals(s, s));

    let _ = group_name(s);
});
