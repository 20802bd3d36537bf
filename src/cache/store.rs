//! The response cache itself: entries, in-flight registry, and per-metric
//! loading/error flags.

use std::collections::HashMap;
use std::future::Future;

use anyhow::Result;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::models::StatsFilter;

/// A fetch that concurrent requesters for the same key clone and await.
type PendingFetch = Shared<BoxFuture<'static, Result<Value, StoreError>>>;

/// Derive the cache key for a metric under a filter.
///
/// Fields join in a fixed order (`person`, `year`, `month`/`range`), present
/// fields only, so the same effective filter always lands on the same key.
pub fn cache_key(metric: &str, filter: &StatsFilter) -> String {
    let mut parts = vec![metric.to_owned()];
    if let Some(person_id) = filter.person_id {
        parts.push(format!("p:{person_id}"));
    }
    if let Some(year) = filter.year {
        parts.push(format!("y:{year}"));
    }
    if let Some(month) = filter.month {
        parts.push(format!("m:{month}"));
    } else if let Some(ref range) = filter.range {
        parts.push(format!("r:{range}"));
    }
    parts.join("|")
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Value>,
    inflight: HashMap<String, PendingFetch>,
    /// Keyed by metric name, not full cache key: different metrics never
    /// clobber each other, while the same metric under different filters
    /// shares one flag.
    loading: HashMap<String, bool>,
    errors: HashMap<String, StoreError>,
    /// Bumped by every invalidation; a fetch that started under an older
    /// epoch must not write its result back.
    epoch: u64,
}

/// Clears the in-flight entry and loading flag if the driving caller is
/// dropped before its write-back runs (timeout, `select!`). Joined waiters
/// keep their clone of the shared future; the next `load` for the key
/// starts fresh instead of joining an abandoned fetch.
struct InflightCleanup<'a> {
    state: &'a Mutex<CacheState>,
    key: String,
    metric: String,
    epoch: u64,
    disarmed: bool,
}

impl Drop for InflightCleanup<'_> {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }
        let mut state = self.state.lock();
        if state.epoch == self.epoch {
            state.inflight.remove(&self.key);
            state.loading.insert(self.metric.clone(), false);
        }
    }
}

/// In-memory cache of statistics responses keyed by `(metric, filter)`.
///
/// All maps are mutated only by the cache's own methods; callers get read
/// accessors and the async [`load`](ResponseCache::load) entry point.
#[derive(Default)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a metric for a filter, deduplicating concurrent requests.
    ///
    /// - cache hit: returns the stored value, `fetcher` is never invoked
    /// - in-flight hit: awaits the existing fetch instead of starting a
    ///   duplicate
    /// - miss: runs `fetcher`, stores the value on success, records the
    ///   error under the metric name on failure, and propagates the outcome
    ///
    /// Remote failures never leave a partial entry behind.
    pub async fn load<F, Fut>(
        &self,
        metric: &str,
        filter: &StatsFilter,
        fetcher: F,
    ) -> Result<Value, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let key = cache_key(metric, filter);

        // First pass under the lock: hit, join, or register a new fetch.
        let (fetch, drive_epoch) = {
            let mut state = self.state.lock();
            if let Some(hit) = state.entries.get(&key) {
                debug!(metric, key = %key, "cache hit");
                return Ok(hit.clone());
            }
            if let Some(pending) = state.inflight.get(&key) {
                debug!(metric, key = %key, "joining in-flight fetch");
                (pending.clone(), None)
            } else {
                debug!(metric, key = %key, "starting fetch");
                state.loading.insert(metric.to_owned(), true);
                state.errors.remove(metric);
                let fetch: PendingFetch = fetcher()
                    .map(|result| result.map_err(StoreError::remote))
                    .boxed()
                    .shared();
                state.inflight.insert(key.clone(), fetch.clone());
                (fetch, Some(state.epoch))
            }
        };

        let Some(epoch) = drive_epoch else {
            return fetch.await;
        };

        // Only the caller that registered the fetch writes back, and only if
        // no invalidation moved the store to a new epoch in the meantime.
        // The cleanup guard covers cancellation of this caller mid-await.
        let mut cleanup = InflightCleanup {
            state: &self.state,
            key: key.clone(),
            metric: metric.to_owned(),
            epoch,
            disarmed: false,
        };
        let result = fetch.await;
        {
            let mut state = self.state.lock();
            if state.epoch == epoch {
                state.inflight.remove(&key);
                state.loading.insert(metric.to_owned(), false);
                match &result {
                    Ok(data) => {
                        state.entries.insert(key, data.clone());
                    }
                    Err(err) => {
                        state.errors.insert(metric.to_owned(), err.clone());
                    }
                }
            } else {
                debug!(metric, key = %key, "discarding fetch result from a stale epoch");
            }
        }
        cleanup.disarmed = true;

        result
    }

    /// Forget every entry, in-flight marker, and flag.
    ///
    /// Outstanding network calls are not cancelled; their eventual results
    /// are discarded via the epoch check in [`load`](ResponseCache::load).
    /// Safe to call repeatedly.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.inflight.clear();
        state.loading.clear();
        state.errors.clear();
        state.epoch = state.epoch.wrapping_add(1);
    }

    /// Whether a fetch for this metric is currently outstanding.
    pub fn is_loading(&self, metric: &str) -> bool {
        self.state.lock().loading.get(metric).copied().unwrap_or(false)
    }

    /// The last fetch error recorded for this metric, if any.
    pub fn error(&self, metric: &str) -> Option<StoreError> {
        self.state.lock().errors.get(metric).cloned()
    }

    /// Cached value for a metric under a filter, without fetching.
    pub fn peek(&self, metric: &str, filter: &StatsFilter) -> Option<Value> {
        self.state.lock().entries.get(&cache_key(metric, filter)).cloned()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
