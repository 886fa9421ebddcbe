//! Rate Limiter: fixed 60-second windows keyed by API key hash. Lives in
//! `infergate-server`, not `infergate-gateway`, because admission step 2
//! (rate-limit) runs before a request is handed to the gateway's pipeline
//! (see `infergate_gateway::gateway`'s module doc).
//!
//! No distributed coordination: each replica keeps its own in-memory map.

use chrono::Utc;
use dashmap::DashMap;
use infergate_core::{GatewayError, RateCounter};

/// Entries whose window is this many windows old are eligible for
/// opportunistic GC.
const STALE_WINDOWS: i64 = 2;

/// Per-key fixed-window counters. `check_and_increment` is atomic per key:
/// `DashMap`'s sharded locking guarantees the read-modify-write in the entry
/// closure never races with a concurrent call on the same key.
pub struct RateLimiter {
    counters: DashMap<String, RateCounter>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Admit or reject one request for `key_hash` against `requests_per_minute`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RateLimited`] with `retry_after` when the cap for the
    /// current window is already reached.
    pub fn check_and_increment(
        &self,
        key_hash: &str,
        requests_per_minute: u32,
    ) -> Result<(), GatewayError> {
        let now = Utc::now().timestamp();
        let window_start = RateCounter::window_start_for(now);

        let mut entry = self
            .counters
            .entry(key_hash.to_owned())
            .or_insert(RateCounter {
                window_start,
                count: 0,
        });

        if entry.window_start != window_start {
            // Window boundary crossed: reset by replacement, never decrement.
            entry.window_start = window_start;
            entry.count = 0;
        }

        if entry.count >= requests_per_minute {
            let retry_after = RateCounter::retry_after(now, entry.window_start);
            return Err(GatewayError::RateLimited { retry_after });
        }

        entry.count += 1;
        Ok(())
    }

    /// Opportunistically drop counters whose window is stale, bounding
    /// memory to active keys.
    pub fn gc(&self) {
        let now = Utc::now().timestamp();
        let cutoff = RateCounter::window_start_for(now) - STALE_WINDOWS * RateCounter::WINDOW_SECONDS;
        self.counters.retain(|_, counter| counter.window_start >= cutoff);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.counters.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_role_cap_then_rejects() {
        let limiter = RateLimiter::new();
        assert!(limiter.check_and_increment("k1", 2).is_ok());
        assert!(limiter.check_and_increment("k1", 2).is_ok());
        let err = limiter.check_and_increment("k1", 2).unwrap_err();
        assert_eq!(err.code(), "rate_limited");
    }

    #[test]
    fn retry_after_is_present_and_at_least_one_second() {
        let limiter = RateLimiter::new();
        limiter.check_and_increment("k2", 1).unwrap();
        let err = limiter.check_and_increment("k2", 1).unwrap_err();
        match err {
            GatewayError::RateLimited { retry_after } => assert!(retry_after >= 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn distinct_keys_have_independent_counters() {
        let limiter = RateLimiter::new();
        limiter.check_and_increment("a", 1).unwrap();
        assert!(limiter.check_and_increment("b", 1).is_ok());
    }

    #[test]
    fn gc_drops_counters_older_than_two_windows() {
        let limiter = RateLimiter::new();
        limiter.counters.insert(
            "stale".to_owned(),
            RateCounter {
                window_start: 0,
                count: 5,
            },
        );
        limiter.gc();
        assert_eq!(limiter.len(), 0);
    }
}
