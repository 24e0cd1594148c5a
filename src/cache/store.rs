//! Concurrent response store with per-key singleflight population.
//!
//! # Responsibilities
//! - Serve live entries without touching the backend
//! - Collapse concurrent misses on one key into a single upstream fetch
//! - Keep the store bounded and expired entries out of it
//!
//! # Design Decisions
//! - Two DashMaps: stored entries and in-flight fetches. Both shard their
//!   locks, so unrelated keys never serialize on each other
//! - The fetch runs in its own task: callers that disconnect stop waiting,
//!   but the fetch still completes and populates the cache for the rest
//! - A failed fetch stores nothing and frees its slot; the next request retries
//! - The slot is freed by a guard owned by the fetch task, so a panicking
//!   fetch cannot wedge its key
//! - Only storable outcomes are shared. A caller that joined a flight whose
//!   response turned out unstorable runs its own fetch

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;

use crate::cache::entry::{CacheStatus, CachedResponse};
use crate::cache::key::CacheKey;
use crate::config::CacheConfig;
use crate::error::GatewayError;
use crate::observability::metrics;

type FlightOutcome = Result<Arc<CachedResponse>, GatewayError>;
type Flight = Shared<BoxFuture<'static, FlightOutcome>>;

struct InFlight {
    id: u64,
    flight: Flight,
}

/// Frees the in-flight slot when the fetch task ends, however it ends.
struct SlotGuard {
    cache: ResponseCache,
    key: CacheKey,
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // Only release the slot this flight owns.
        self.cache.inner.inflight.remove_if(&self.key, |_, slot| slot.id == self.id);
    }
}

struct Inner {
    entries: DashMap<CacheKey, Arc<CachedResponse>>,
    inflight: DashMap<CacheKey, InFlight>,
    next_flight: AtomicU64,
    max_entries: usize,
    default_ttl: Duration,
}

/// Shared response cache. Cloning is cheap and shares the same store.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                inflight: DashMap::new(),
                next_flight: AtomicU64::new(1),
                max_entries: config.max_entries.max(1),
                default_ttl: Duration::from_secs(config.default_ttl_secs),
            }),
        }
    }

    /// TTL applied when a route does not set its own.
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Live entry for `key`, evicting it if it has expired.
    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<CachedResponse>> {
        let cached = self.inner.entries.get(key).map(|r| r.value().clone())?;
        if cached.is_fresh() {
            return Some(cached);
        }
        if self.inner.entries.remove_if(key, |_, v| !v.is_fresh()).is_some() {
            tracing::debug!(key = %key, "Evicted expired cache entry");
        }
        None
    }

    /// Serve `key` from the cache, or run `fetch` once for every concurrent
    /// caller and share its outcome.
    ///
    /// `fetch` is invoked by the caller that starts a new flight, and by a
    /// caller that joined one whose response may not be stored: such a
    /// response belongs to the request that produced it.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<(Arc<CachedResponse>, CacheStatus), GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedResponse, GatewayError>> + Send + 'static,
    {
        if let Some(hit) = self.lookup(&key) {
            metrics::record_cache_lookup("hit");
            return Ok((hit, CacheStatus::Hit));
        }

        let (flight, own_fetch) = match self.inner.inflight.entry(key.clone()) {
            Entry::Occupied(slot) => {
                tracing::debug!(key = %key, "Joining in-flight fetch");
                metrics::record_cache_lookup("joined");
                (slot.get().flight.clone(), Some(fetch))
            }
            Entry::Vacant(slot) => {
                // A flight may have landed between the lookup and taking the slot.
                if let Some(hit) = self.lookup(&key) {
                    metrics::record_cache_lookup("hit");
                    return Ok((hit, CacheStatus::Hit));
                }
                metrics::record_cache_lookup("miss");
                let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
                let flight = self.start_flight(id, key.clone(), ttl, fetch());
                slot.insert(InFlight {
                    id,
                    flight: flight.clone(),
                });
                (flight, None)
            }
        };

        let response = flight.await?;
        match own_fetch {
            Some(fetch) if !response.is_storable() => {
                tracing::debug!(key = %key, status = %response.status, "Shared response not storable, fetching separately");
                let own = fetch().await?;
                Ok((Arc::new(own), CacheStatus::Miss))
            }
            _ => Ok((response, CacheStatus::Miss)),
        }
    }

    fn start_flight<Fut>(&self, id: u64, key: CacheKey, ttl: Duration, fetch: Fut) -> Flight
    where
        Fut: Future<Output = Result<CachedResponse, GatewayError>> + Send + 'static,
    {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let _slot = SlotGuard {
                cache: cache.clone(),
                key: key.clone(),
                id,
            };
            let outcome = fetch.await.map(|response| Arc::new(response.with_ttl(ttl)));
            match &outcome {
                Ok(response) if response.is_storable() => {
                    cache.store(key.clone(), response.clone());
                }
                Ok(response) => {
                    tracing::debug!(key = %key, status = %response.status, "Response not storable");
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Cache fill failed");
                }
            }
            outcome
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(GatewayError::Internal(format!("cache fill task: {}", e))))
        }
        .boxed()
        .shared()
    }

    fn store(&self, key: CacheKey, response: Arc<CachedResponse>) {
        if self.inner.entries.len() >= self.inner.max_entries && !self.inner.entries.contains_key(&key) {
            self.purge_expired();
            if self.inner.entries.len() >= self.inner.max_entries {
                self.evict_oldest();
            }
        }
        self.inner.entries.insert(key, response);
        metrics::record_cache_size(self.inner.entries.len());
    }

    fn evict_oldest(&self) {
        let oldest = self
            .inner
            .entries
            .iter()
            .min_by_key(|r| r.value().stored_at())
            .map(|r| r.key().clone());
        if let Some(key) = oldest {
            self.inner.entries.remove(&key);
            tracing::debug!(key = %key, "Evicted oldest cache entry");
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, v| v.is_fresh());
        let removed = before.saturating_sub(self.inner.entries.len());
        metrics::record_cache_size(self.inner.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Number of fetches currently populating the cache.
    pub fn inflight_count(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Periodically purge expired entries until shutdown.
    pub async fn run_sweeper(self, every: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Cache sweep");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
