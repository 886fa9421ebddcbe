//! Minimal request counters exposed via `GET /metrics`. Prometheus itself —
//! scraping, alerting, dashboards — is an external collaborator out of
//! scope for this crate; this module only keeps the small set
//! of atomic counters the endpoint's contract requires and renders them in
//! the text exposition format.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide request counters. Cheap enough to update on every request
/// without contention: four atomics, no locks.
#[derive(Default)]
pub struct GatewayMetrics {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    cache_hits_total: AtomicU64,
    cache_misses_total: AtomicU64,
}

impl GatewayMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, is_error: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Render counters in the Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "# TYPE infergate_requests_total counter\n\
            infergate_requests_total {}\n\
            # TYPE infergate_errors_total counter\n\
            infergate_errors_total {}\n\
            # TYPE infergate_cache_hits_total counter\n\
            infergate_cache_hits_total {}\n\
            # TYPE infergate_cache_misses_total counter\n\
            infergate_cache_misses_total {}\n",
            self.requests_total.load(Ordering::Relaxed),
            self.errors_total.load(Ordering::Relaxed),
            self.cache_hits_total.load(Ordering::Relaxed),
            self.cache_misses_total.load(Ordering::Relaxed),
        )
    }
}
