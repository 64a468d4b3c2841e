//! TTL-keyed idempotency store.
//!
//! Expired keys are swept lazily on every access, before the lookup or insert
//! is evaluated. The sweep is linear in the number of live keys.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

/// In-memory set of accepted idempotency keys with expiry.
#[derive(Debug)]
pub struct IdempotencyStore {
    ttl_ms: u64,
    entries: Mutex<HashMap<String, u64>>,
}

impl IdempotencyStore {
    /// Creates an empty store whose keys live for `ttl_ms`.
    pub fn new(ttl_ms: u64) -> Self {
        Self { ttl_ms, entries: Mutex::new(HashMap::new()) }
    }

    /// Key lifetime in milliseconds.
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Whether `key` was accepted less than `ttl_ms` before `now_ms`.
    pub fn has(&self, key: &str, now_ms: u64) -> bool {
        self.sweep(now_ms).contains_key(key)
    }

    /// Records `key` as accepted at `now_ms`.
    ///
    /// Re-recording a live key restarts its TTL.
    pub fn put(&self, key: &str, now_ms: u64) {
        let mut entries = self.sweep(now_ms);
        entries.insert(key.to_string(), now_ms.saturating_add(self.ttl_ms));
    }

    /// Records `key` as accepted at `now_ms` unless it is already live.
    ///
    /// Lookup and insert happen under one lock, so of several concurrent
    /// callers with the same key exactly one gets `true`.
    pub fn insert_if_absent(&self, key: &str, now_ms: u64) -> bool {
        let mut entries = self.sweep(now_ms);
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), now_ms.saturating_add(self.ttl_ms));
        true
    }

    /// Number of live keys at `now_ms`.
    pub fn len(&self, now_ms: u64) -> usize {
        self.sweep(now_ms).len()
    }

    /// Whether no keys are live at `now_ms`.
    pub fn is_empty(&self, now_ms: u64) -> bool {
        self.len(now_ms) == 0
    }

    fn sweep(&self, now_ms: u64) -> MutexGuard<'_, HashMap<String, u64>> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.retain(|_, expires_at| *expires_at > now_ms);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lives_for_exactly_ttl() {
        let store = IdempotencyStore::new(1_000);
        store.put("k", 5_000);

        assert!(store.has("k", 5_000));
        assert!(store.has("k", 5_999));
        assert!(!store.has("k", 6_000));
        assert!(store.is_empty(6_000));
    }

    #[test]
    fn unknown_key_is_absent() {
        let store = IdempotencyStore::new(1_000);
        store.put("a", 0);

        assert!(!store.has("b", 0));
    }

    #[test]
    fn access_sweeps_expired_entries() {
        let store = IdempotencyStore::new(100);
        store.put("old", 0);
        store.put("new", 50);
        assert_eq!(store.len(50), 2);

        store.put("newer", 100);
        assert_eq!(store.len(100), 2);
        assert!(!store.has("old", 100));
    }

    #[test]
    fn put_restarts_ttl() {
        let store = IdempotencyStore::new(100);
        store.put("k", 0);
        store.put("k", 80);

        assert!(store.has("k", 150));
    }

    #[test]
    fn insert_if_absent_claims_a_key_once() {
        let store = IdempotencyStore::new(100);

        assert!(store.insert_if_absent("k", 0));
        assert!(!store.insert_if_absent("k", 50));
        assert!(store.has("k", 99));
        assert!(store.insert_if_absent("k", 100));
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let store = std::sync::Arc::new(IdempotencyStore::new(1_000));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || store.insert_if_absent("k", 0))
            })
            .collect();
        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn saturates_near_u64_max() {
        let store = IdempotencyStore::new(u64::MAX);
        store.put("k", 10);

        assert!(store.has("k", u64::MAX - 1));
    }
}
