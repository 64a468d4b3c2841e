#![no_main]

//! Fuzz target for hex signature comparison.
//!
//! Comparison must never panic, must be symmetric, and must agree with a
//! plain comparison of the decoded bytes.

use libfuzzer_sys::fuzz_target;
use noirforge_webhooks::crypto::timing_safe_eq_hex;

fuzz_target!(|data: (&str, &str)| {
    let (a, b) = data;

    let result = timing_safe_eq_hex(a, b);
    assert_eq!(result, timing_safe_eq_hex(b, a));

    let decoded = match (hex::decode(a), hex::decode(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    assert_eq!(result, decoded);
});
