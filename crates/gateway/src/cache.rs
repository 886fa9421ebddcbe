//! Completion Cache: a two-tier cache keyed by a request fingerprint,
//! with single-flight semantics for concurrent identical requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use infergate_core::{Fingerprint, GatewayError};
use infergate_db::CompletionCacheStore;
use infergate_state::{KeyKind, StateKey, StateStore};
use tokio::sync::OnceCell;
use tracing::debug;

/// Result of a cache-aware generation: the value plus whether it was served
/// from a cache tier rather than a fresh backend call.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub value: String,
    pub cached: bool,
}

/// Orchestrates the fast (process-local `StateStore`) and durable
/// (relational) cache tiers. Read order: fast → durable → backend. A model
/// call that produces a cache-eligible result writes durable then fast.
/// A miss is never cached as a negative.
pub struct CompletionCache {
    fast: Option<Arc<dyn StateStore>>,
    fast_ttl: Option<Duration>,
    durable: Arc<CompletionCacheStore>,
    /// Single-flight coalescing map: concurrent callers with the same
    /// fingerprint share one `OnceCell`, so only the first caller to reach
    /// it actually runs the generate future.
    inflight: DashMap<String, Arc<OnceCell<String>>>,
}

impl CompletionCache {
    #[must_use]
    pub fn new(
        fast: Option<Arc<dyn StateStore>>,
        fast_ttl: Option<Duration>,
        durable: Arc<CompletionCacheStore>,
    ) -> Self {
        Self {
            fast,
            fast_ttl,
            durable,
            inflight: DashMap::new(),
        }
    }

    /// Look up `fingerprint` in the fast then durable tier; on a full miss,
    /// run `generate` (single-flight across concurrent callers with the
    /// same fingerprint) and populate both tiers with the result.
    ///
    /// # Errors
    ///
    /// Propagates whatever `generate` returns on a miss; cache I/O failures
    /// in the fast tier are logged and treated as misses rather than surfaced,
    /// since the durable tier (or the backend) remains authoritative.
    pub async fn get_or_generate<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        generate: F,
    ) -> Result<CachedValue, GatewayError>
    where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, GatewayError>>,
    {
        let key = fingerprint.as_str().to_owned();

        if let Some(value) = self.read_fast(&key).await {
            return Ok(CachedValue {
                    value,
                    cached: true,
            });
        }

        if let Some(entry) = self.read_durable(&key).await {
            self.write_fast(&key, &entry).await;
            return Ok(CachedValue {
                    value: entry,
                    cached: true,
            });
        }

        let cell = Arc::clone(
            self.inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let result = cell
            .get_or_try_init(|| async {
                let value = generate().await?;
                self.durable.put(&key, &value).await.map_err(|e| {
                        GatewayError::Internal(format!("durable cache write failed: {e}"))
                })?;
                self.write_fast(&key, &value).await;
                Ok::<_, GatewayError>(value)
        })
            .await
            .cloned();

        self.inflight.remove(&key);
        result.map(|value| CachedValue {
                value,
                cached: false,
        })
    }

    async fn read_fast(&self, key: &str) -> Option<String> {
        let fast = self.fast.as_ref()?;
        let state_key = StateKey::new(KeyKind::Cache, key);
        match fast.get(&state_key).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "fast cache tier read failed, falling through");
                None
            }
        }
    }

    async fn write_fast(&self, key: &str, value: &str) {
        let Some(fast) = self.fast.as_ref() else {
            return;
        };
        let state_key = StateKey::new(KeyKind::Cache, key);
        if let Err(e) = fast.set(&state_key, value, self.fast_ttl).await {
            debug!(error = %e, "fast cache tier write failed");
        }
    }

    async fn read_durable(&self, key: &str) -> Option<String> {
        match self.durable.get(key).await {
            Ok(entry) => entry.map(|e| e.value),
            Err(e) => {
                debug!(error = %e, "durable cache tier read failed, falling through");
                None
            }
        }
    }
}
