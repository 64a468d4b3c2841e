//! Property-based tests for backoff and endpoint rotation invariants.

use std::time::Duration;

use noirforge_rpc::{backoff::backoff_delay_ms, BackoffPolicy, EndpointPool};
use proptest::prelude::*;

proptest! {
    /// Delays never exceed the cap and never shrink as attempts grow.
    #[test]
    fn delay_is_bounded_and_non_decreasing(
        base in 0u64..2_000,
        max in 0u64..20_000,
        attempt in 0u32..40,
    ) {
        let current = backoff_delay_ms(attempt, base, max);
        let next = backoff_delay_ms(attempt + 1, base, max);

        prop_assert!(current <= max);
        prop_assert!(next <= max);
        prop_assert!(current <= next, "attempt {attempt}: {current} > {next}");
    }

    /// Rate-limited delays always respect the rate-limit floor.
    #[test]
    fn rate_limited_delay_respects_floor(
        rate_limit_ms in 0u64..10_000,
        attempt in 0u32..16,
    ) {
        let policy = BackoffPolicy {
            rate_limit_delay: Duration::from_millis(rate_limit_ms),
            ..BackoffPolicy::default()
        };

        let delay = policy.delay_for(attempt, true);
        prop_assert!(delay >= Duration::from_millis(rate_limit_ms));
        prop_assert!(delay <= policy.max_delay.max(policy.rate_limit_delay));
    }

    /// After `n` advances the cursor sits at `n mod len`, and websocket
    /// lookups never go out of bounds whatever the list lengths.
    #[test]
    fn rotation_wraps_and_ws_lookup_is_total(
        len in 1usize..6,
        ws_len in 0usize..8,
        advances in 0usize..32,
    ) {
        let endpoints: Vec<String> = (0..len).map(|i| format!("https://rpc{i}")).collect();
        let ws: Vec<String> = (0..ws_len).map(|i| format!("wss://ws{i}")).collect();
        let pool = EndpointPool::new(endpoints.clone(), Some(ws.clone())).unwrap();

        for _ in 0..advances {
            pool.advance();
        }

        let idx = advances % len;
        prop_assert_eq!(pool.current(), endpoints[idx].as_str());

        let expected = if ws_len == len {
            Some(ws[idx].as_str())
        } else if ws_len == 1 {
            Some(ws[0].as_str())
        } else {
            None
        };
        prop_assert_eq!(pool.current_ws(), expected);
    }
}
