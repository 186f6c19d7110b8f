//! Result Cache
//!
//! Memoizes regional statistics keyed by (region, date, parameter set).
//!
//! ```text
//! get_or_compute(key)
//!   → slot for key (created under a short mutex)
//!   → OnceCell::get_or_try_init
//!        first caller:  backend lookup → compute → backend store
//!        other callers: await the same cell
//!   → Arc<AggregationResult>
//! ```
//!
//! - At most one computation per key runs at a time; concurrent callers
//!   share its `Arc`. A failed computation leaves the cell empty, so the
//!   next caller tries again.
//! - Entries older than the TTL are replaced by a fresh slot.
//! - `clear()` drops every slot and empties the backend.
//! - Backend errors are logged and otherwise ignored.

mod backend;

pub use backend::{CacheBackend, CacheError, CachedRecord, SqliteCacheBackend};

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use crate::query::AggregationResult;
use crate::storage::ParameterCode;

/// Prefix of rendered keys
pub const KEY_PREFIX: &str = "meteo_stats";

/// Identity of a cached result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    region_id: String,
    date: NaiveDate,
    /// Sorted, without duplicates
    parameters: Vec<ParameterCode>,
}

impl CacheKey {
    pub fn new(
        region_id: impl Into<String>,
        date: NaiveDate,
        parameters: impl IntoIterator<Item = ParameterCode>,
    ) -> Self {
        let mut parameters: Vec<ParameterCode> = parameters.into_iter().collect();
        parameters.sort();
        parameters.dedup();

        Self {
            region_id: region_id.into(),
            date,
            parameters,
        }
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn parameters(&self) -> &[ParameterCode] {
        &self.parameters
    }
}

impl std::fmt::Display for CacheKey {
    /// `meteo_stats:{region}:{date}:{code,code,...}`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let codes: Vec<&str> = self.parameters.iter().map(|p| p.code()).collect();
        write!(
            f,
            "{}:{}:{}:{}",
            KEY_PREFIX,
            self.region_id,
            self.date,
            codes.join(",")
        )
    }
}

struct Entry {
    result: Arc<AggregationResult>,
    stored_at: Instant,
}

type Slot = Arc<OnceCell<Entry>>;

/// Counters for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub backend_hits: u64,
    pub backend_errors: u64,
}

/// Single-flight memoization of aggregation results
pub struct ResultCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    ttl: Option<Duration>,
    backend: Option<Arc<dyn CacheBackend>>,
    /// Bumped by `clear`; computations started before a clear are not persisted
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    backend_hits: AtomicU64,
    backend_errors: AtomicU64,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ResultCache {
    /// In-memory cache; `ttl = None` keeps entries until cleared
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
            backend: None,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            backend_hits: AtomicU64::new(0),
            backend_errors: AtomicU64::new(0),
        }
    }

    /// Builder: add a persistent backend
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>> {
        // The map holds no invariant a panicking holder could break
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.ttl
            .map(|ttl| entry.stored_at.elapsed() >= ttl)
            .unwrap_or(false)
    }

    /// Holds a result that has not expired
    fn is_live(&self, slot: &Slot) -> bool {
        slot.get().map(|e| !self.is_expired(e)).unwrap_or(false)
    }

    /// Expired slots, and empty slots no caller is waiting on
    fn is_stale(&self, slot: &Slot) -> bool {
        match slot.get() {
            Some(entry) => self.is_expired(entry),
            None => Arc::strong_count(slot) == 1,
        }
    }

    /// Live slot for `key`, replacing an expired one
    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.lock_slots();

        if let Some(slot) = slots.get(key) {
            let expired = slot.get().map(|e| self.is_expired(e)).unwrap_or(false);
            if !expired {
                return Arc::clone(slot);
            }
        }

        let before = slots.len();
        slots.retain(|_, slot| !self.is_stale(slot));
        if slots.len() < before {
            tracing::debug!(removed = before - slots.len(), "Pruned stale cache slots");
        }

        let slot: Slot = Arc::new(OnceCell::new());
        slots.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    /// Drop the slot of a failed computation unless another caller still waits on it
    fn release(&self, key: &CacheKey, slot: Slot) {
        let mut slots = self.lock_slots();
        drop(slot);
        if slots.get(key).map(|s| self.is_stale(s)).unwrap_or(false) {
            slots.remove(key);
        }
    }

    /// Cached result for `key`, computing it at most once across concurrent callers
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Arc<AggregationResult>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AggregationResult, E>>,
    {
        let slot = self.slot(&key);

        if let Some(entry) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.result));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let generation = self.generation.load(Ordering::SeqCst);
        let key_ref = &key;

        let computed = slot
            .get_or_try_init(|| async move {
                if let Some(record) = self.backend_get(key_ref).await {
                    let age = record.age();
                    let stored_at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
                    return Ok::<_, E>(Entry {
                        result: Arc::new(record.result),
                        stored_at,
                    });
                }

                self.computations.fetch_add(1, Ordering::Relaxed);
                let result = compute().await?;

                if self.generation.load(Ordering::SeqCst) == generation {
                    self.backend_put(key_ref, &result).await;
                }

                Ok::<_, E>(Entry {
                    result: Arc::new(result),
                    stored_at: Instant::now(),
                })
            })
            .await
            .map(|entry| Arc::clone(&entry.result));

        if computed.is_err() {
            self.release(&key, slot);
        }
        computed
    }

    /// Cached result for `key` without computing, `None` on a miss or expiry
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<AggregationResult>> {
        let slots = self.lock_slots();
        let entry = slots.get(key)?.get()?;
        if self.is_expired(entry) {
            return None;
        }
        Some(Arc::clone(&entry.result))
    }

    /// Drop every entry and empty the backend; returns the number of unexpired memory entries dropped
    pub async fn clear(&self) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let dropped = {
            let mut slots = self.lock_slots();
            let count = slots.values().filter(|s| self.is_live(s)).count();
            slots.clear();
            count
        };

        if let Some(backend) = &self.backend {
            match backend.clear().await {
                Ok(removed) => tracing::info!(
                    backend = backend.name(),
                    removed,
                    "Cleared persistent result cache"
                ),
                Err(e) => {
                    self.backend_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(backend = backend.name(), error = %e, "Failed to clear cache backend");
                }
            }
        }

        tracing::info!(dropped, "Result cache cleared");
        dropped
    }

    /// Number of unexpired entries held in memory
    pub fn len(&self) -> usize {
        self.lock_slots().values().filter(|s| self.is_live(s)).count()
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            backend_hits: self.backend_hits.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }

    async fn backend_get(&self, key: &CacheKey) -> Option<CachedRecord> {
        let backend = self.backend.as_ref()?;
        let rendered = key.to_string();

        match backend.get(&rendered).await {
            Ok(Some(record)) => {
                if self.ttl.map(|ttl| record.age() >= ttl).unwrap_or(false) {
                    return None;
                }
                self.backend_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %rendered, "Result served from cache backend");
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                self.backend_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    backend = backend.name(),
                    key = %rendered,
                    error = %e,
                    "Cache backend read failed, treating as miss"
                );
                None
            }
        }
    }

    async fn backend_put(&self, key: &CacheKey, result: &AggregationResult) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let rendered = key.to_string();

        if let Err(e) = backend.put(&rendered, &CachedRecord::new(result.clone())).await {
            self.backend_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                backend = backend.name(),
                key = %rendered,
                error = %e,
                "Cache backend write failed, keeping result in memory only"
            );
        }
    }
}
