//! Exponential backoff with jitter and rate-limit escalation.
//!
//! The delay for attempt `n` is `min(max, base * 2^n)` plus up to 100ms of
//! jitter, clamped to `max`. Rate-limited failures never wait less than the
//! configured rate-limit delay.

use std::{fmt, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_RATE_LIMIT_DELAY_MS};

/// Upper bound on the jitter added to a delay, in milliseconds.
const MAX_JITTER_MS: u64 = 100;

/// Message fragments that mark an error as a rate-limit response.
const RATE_LIMIT_MARKERS: [&str; 4] = ["429", "too many requests", "rate limit", "rate-limited"];

/// Delay calculation for failed RPC attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Base delay for the first retry.
    pub base_delay: Duration,
    /// Cap on the exponential part plus jitter.
    pub max_delay: Duration,
    /// Floor applied when the failure was a rate limit.
    pub rate_limit_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            rate_limit_delay: Duration::from_millis(DEFAULT_RATE_LIMIT_DELAY_MS),
        }
    }
}

impl BackoffPolicy {
    /// Jittered exponential delay for a 0-based attempt index.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(backoff_delay_ms(
            attempt,
            duration_millis(self.base_delay),
            duration_millis(self.max_delay),
        ))
    }

    /// Delay to apply after `attempt` failed, escalated for rate limits.
    pub fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let delay = self.delay(attempt);
        if rate_limited {
            delay.max(self.rate_limit_delay)
        } else {
            delay
        }
    }
}

/// Computes `min(max, base * 2^attempt) + jitter`, clamped to `max_ms`.
///
/// Jitter is uniform in `[0, min(100, exp + 1))`, so a zero base produces a
/// zero delay.
pub fn backoff_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let multiplier = 2_u64.saturating_pow(attempt);
    let exponential = base_ms.saturating_mul(multiplier).min(max_ms);

    let jitter_bound = MAX_JITTER_MS.min(exponential.saturating_add(1));
    let jitter = rand::rng().random_range(0..jitter_bound);

    exponential.saturating_add(jitter).min(max_ms)
}

/// Returns whether an error message looks like a rate-limit response.
///
/// Case-insensitive substring match on the rendered message.
pub fn is_rate_limited<E: fmt::Display + ?Sized>(error: &E) -> bool {
    let message = error.to_string().to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| message.contains(marker))
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_part_doubles_until_capped() {
        for _ in 0..20 {
            let d0 = backoff_delay_ms(0, 250, 5_000);
            let d1 = backoff_delay_ms(1, 250, 5_000);
            let d2 = backoff_delay_ms(2, 250, 5_000);
            let d5 = backoff_delay_ms(5, 250, 5_000);

            assert!((250..350).contains(&d0), "attempt 0 gave {d0}");
            assert!((500..600).contains(&d1), "attempt 1 gave {d1}");
            assert!((1_000..1_100).contains(&d2), "attempt 2 gave {d2}");
            assert_eq!(d5, 5_000);
        }
    }

    #[test]
    fn zero_base_means_zero_delay() {
        assert_eq!(backoff_delay_ms(0, 0, 5_000), 0);
        assert_eq!(backoff_delay_ms(7, 0, 5_000), 0);
    }

    #[test]
    fn small_exponential_limits_jitter() {
        // exp = 1ms, so jitter is drawn from [0, 2)
        for _ in 0..50 {
            assert!(backoff_delay_ms(0, 1, 5_000) <= 2);
        }
    }

    #[test]
    fn huge_attempt_indices_saturate() {
        assert_eq!(backoff_delay_ms(u32::MAX, 250, 5_000), 5_000);
        assert_eq!(backoff_delay_ms(200, u64::MAX, u64::MAX), u64::MAX);
    }

    #[test]
    fn rate_limited_delay_has_floor() {
        let policy = BackoffPolicy::default();

        let delay = policy.delay_for(0, true);
        assert!(delay >= Duration::from_millis(1_000));

        let plain = policy.delay_for(0, false);
        assert!(plain < Duration::from_millis(1_000));
    }

    #[test]
    fn rate_limited_keeps_larger_exponential_delay() {
        let policy = BackoffPolicy::default();
        let delay = policy.delay_for(4, true);
        assert!(delay >= Duration::from_millis(4_000));
        assert!(delay <= policy.max_delay);
    }

    #[test]
    fn rate_limit_markers_match_case_insensitively() {
        assert!(is_rate_limited("HTTP 429"));
        assert!(is_rate_limited("Too Many Requests"));
        assert!(is_rate_limited("RPC rate limit exceeded"));
        assert!(is_rate_limited("you are Rate-Limited"));

        assert!(!is_rate_limited("connection refused"));
        assert!(!is_rate_limited("HTTP 503 Service Unavailable"));
    }
}
