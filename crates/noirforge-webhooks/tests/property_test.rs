//! Property-based tests for provider verification and the idempotency store.

use axum::http::{HeaderMap, HeaderValue};
use noirforge_webhooks::{crypto::quicknode_signature, IdempotencyStore, Outcome, Verifier};
use proptest::prelude::*;

const NOW_MS: u64 = 1_700_000_000_000;

fn headers(nonce: &str, timestamp: &str, signature: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-qn-nonce", HeaderValue::from_str(nonce).unwrap());
    headers.insert("x-qn-timestamp", HeaderValue::from_str(timestamp).unwrap());
    headers.insert("x-qn-signature", HeaderValue::from_str(signature).unwrap());
    headers
}

proptest! {
    /// Any body signed with the configured secret inside the window verifies,
    /// and flipping one hex digit of the signature makes it fail.
    #[test]
    fn signed_bodies_verify_and_tampering_fails(
        secret in "[a-zA-Z0-9]{1,32}",
        nonce in "[a-z0-9-]{1,24}",
        skew_secs in 0u64..300,
        body in proptest::collection::vec(any::<u8>(), 0..256),
        flip in 0usize..64,
    ) {
        let verifier = Verifier::QuickNode { secret: Some(secret.clone()), replay_skew_ms: 300_000 };
        let timestamp = (NOW_MS / 1000 - skew_secs).to_string();
        let signature = quicknode_signature(&secret, &nonce, &timestamp, &body).unwrap();

        prop_assert_eq!(verifier.verify(&headers(&nonce, &timestamp, &signature), &body, NOW_MS), Ok(()));

        let mut tampered: Vec<char> = signature.chars().collect();
        tampered[flip] = if tampered[flip] == '0' { '1' } else { '0' };
        let tampered: String = tampered.into_iter().collect();

        prop_assert_eq!(
            verifier.verify(&headers(&nonce, &timestamp, &tampered), &body, NOW_MS),
            Err(Outcome::InvalidSignature)
        );
    }

    /// A key is present for exactly `ttl` milliseconds after it is put.
    #[test]
    fn keys_live_exactly_ttl(ttl in 1u64..1_000_000, put_at in 0u64..1_000_000, probe in 0u64..2_000_000) {
        let store = IdempotencyStore::new(ttl);
        store.put("k", put_at);

        let now = put_at + probe;
        prop_assert_eq!(store.has("k", now), probe < ttl);
    }
}
