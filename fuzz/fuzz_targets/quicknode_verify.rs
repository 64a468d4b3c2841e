#![no_main]

//! Fuzz target for QuickNode delivery verification.
//!
//! Splits the input into nonce, timestamp, signature and body, then checks
//! that verification never panics, that hostile headers are rejected, and
//! that the same fields signed with the configured secret are accepted.

use axum::http::{HeaderMap, HeaderValue};
use libfuzzer_sys::fuzz_target;
use noirforge_webhooks::{crypto::quicknode_signature, Outcome, Verifier};

const SECRET: &str = "fuzz-secret";
const NOW_MS: u64 = 1_700_000_000_000;

fuzz_target!(|data: &[u8]| {
    let mut parts = data.splitn(4, |b| *b == 0);
    let (Some(nonce), Some(timestamp), Some(signature), Some(body)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return;
    };

    let verifier = Verifier::QuickNode { secret: Some(SECRET.to_string()), replay_skew_ms: 300_000 };

    let Some(headers) = headers(nonce, timestamp, signature) else {
        return;
    };
    if let Ok(()) = verifier.verify(&headers, body, NOW_MS) {
        // Only a correct signature may pass.
        let (Ok(nonce), Ok(timestamp), Ok(signature)) = (
            std::str::from_utf8(nonce),
            std::str::from_utf8(timestamp),
            std::str::from_utf8(signature),
        ) else {
            panic!("accepted non-UTF-8 headers");
        };
        let expected = quicknode_signature(SECRET, nonce, timestamp, body).unwrap();
        assert!(signature.eq_ignore_ascii_case(&expected));
    }

    let (Ok(nonce), Ok(timestamp)) = (std::str::from_utf8(nonce), std::str::from_utf8(timestamp))
    else {
        return;
    };
    let Ok(expected) = quicknode_signature(SECRET, nonce, timestamp, body) else {
        return;
    };
    let Some(headers) = headers(nonce.as_bytes(), timestamp.as_bytes(), expected.as_bytes()) else {
        return;
    };

    match verifier.verify(&headers, body, NOW_MS) {
        Ok(()) | Err(Outcome::ReplayRejected | Outcome::MissingHeaders) => {},
        Err(other) => panic!("correctly signed delivery rejected with {other}"),
    }
});

fn headers(nonce: &[u8], timestamp: &[u8], signature: &[u8]) -> Option<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert("x-qn-nonce", HeaderValue::from_bytes(nonce).ok()?);
    headers.insert("x-qn-timestamp", HeaderValue::from_bytes(timestamp).ok()?);
    headers.insert("x-qn-signature", HeaderValue::from_bytes(signature).ok()?);
    Some(headers)
}
