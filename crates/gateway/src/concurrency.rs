//! Concurrency Gate: bounded admission to the heavy routes
//! (`/v1/generate`, `/v1/generate/batch`, `/v1/extract`) via a counting
//! semaphore. Discipline is queue, never reject: callers wait for a permit
//! rather than being turned away.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

const SLOW_ACQUIRE_THRESHOLD_MS: u128 = 5;

/// Guards a permit for the lifetime of one heavy-route request. Dropping it
/// releases the permit, including on an early return or panic unwind.
pub struct ConcurrencyPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

/// A counting semaphore with capacity `max_concurrent_requests` (default 2).
/// Acquisition happens after admission checks and before backend invocation;
/// release is automatic via `Drop` on all exit paths.
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Wait for a permit, logging if the wait exceeds 5 ms.
    /// `request_id` and `path` are included so the log line can be
    /// correlated with the rest of the request's trace.
    pub async fn acquire(&self, request_id: &str, path: &str) -> ConcurrencyPermit<'_> {
        let started = Instant::now();
        // The semaphore is only ever closed by `Drop`ping the gate itself,
        // which never happens while requests are in flight.
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("concurrency gate semaphore is never closed");
        let waited = started.elapsed();
        if waited.as_millis() > SLOW_ACQUIRE_THRESHOLD_MS {
            debug!(
                request_id,
                path,
                wait_ms = waited.as_millis(),
                "concurrency gate wait exceeded threshold"
            );
        }
        ConcurrencyPermit { _permit: permit }
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn capacity_bounds_concurrent_holders() {
        let gate = Arc::new(ConcurrencyGate::new(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..6 {
            let gate = Arc::clone(&gate);
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                        let _permit = gate.acquire("req", "/v1/generate").await;
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        i
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn permit_is_released_on_drop_even_without_explicit_release() {
        let gate = ConcurrencyGate::new(1);
        {
            let _permit = gate.acquire("req", "/v1/extract").await;
            assert_eq!(gate.available_permits(), 0);
        }
        assert_eq!(gate.available_permits(), 1);
    }

    #[tokio::test]
    async fn zero_capacity_is_coerced_to_one() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.available_permits(), 1);
    }
}
