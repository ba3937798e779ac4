//! Memoized pool metrics
//!
//! Entries (including "not enough data" results) live until the store
//! reports a mutation touching their id. The cache registers itself as a
//! store listener on `attach`.
use super::metrics;
use super::store::{GenerationCounter, HistoryStore, InvalidationScope, StoreListener};
use super::types::PoolMetrics;
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct MetricsCache {
    store: Arc<HistoryStore>,
    generation: Arc<GenerationCounter>,
    memo: Mutex<HashMap<String, Option<PoolMetrics>>>,
    stats: Mutex<CacheMetrics>,
}

impl MetricsCache {
    /// Create a cache over `store` and subscribe it to store mutations
    pub fn attach(store: Arc<HistoryStore>) -> Arc<Self> {
        let cache = Arc::new(Self {
            generation: store.generation_counter(),
            store: Arc::clone(&store),
            memo: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheMetrics::default()),
        });

        let listener: Arc<dyn StoreListener> = cache.clone();
        store.add_listener(Arc::downgrade(&listener));
        cache
    }

    /// Metrics for `id`, computed from the stored record on first use
    pub fn get(&self, id: &str) -> Option<PoolMetrics> {
        // Held across the computation so an invalidation cannot slip in
        // between reading the record and memoizing the result.
        let mut memo = self.memo.lock();

        if let Some(cached) = memo.get(id) {
            self.stats.lock().hits += 1;
            return cached.clone();
        }

        self.stats.lock().misses += 1;
        let computed = self
            .store
            .get(id)
            .and_then(|record| metrics::calculate(&record.points, self.store.now()));

        if computed.is_none() {
            logger::verbose(
                LogTag::Metrics,
                &format!("Not enough history for {} to compute metrics", id),
            );
        }

        memo.insert(id.to_string(), computed.clone());
        computed
    }

    /// Drop the memo entry for `id` and return the current store generation
    pub fn invalidate(&self, id: &str) -> u64 {
        if self.memo.lock().remove(id).is_some() {
            self.stats.lock().invalidations += 1;
        }
        self.generation.current()
    }

    pub fn invalidate_all(&self) -> u64 {
        let dropped = {
            let mut memo = self.memo.lock();
            let dropped = memo.len() as u64;
            memo.clear();
            dropped
        };
        self.stats.lock().invalidations += dropped;
        self.generation.current()
    }

    /// Metrics for every stored id that has enough history, sorted by id
    pub fn get_all(&self) -> Vec<(String, PoolMetrics)> {
        self.store
            .ids()
            .into_iter()
            .filter_map(|id| self.get(&id).map(|m| (id, m)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.memo.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.lock().is_empty()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.stats.lock().clone()
    }
}

impl StoreListener for MetricsCache {
    fn on_invalidate(&self, scope: &InvalidationScope) {
        match scope {
            InvalidationScope::Ids(ids) => {
                for id in ids {
                    self.invalidate(id);
                }
            }
            InvalidationScope::All => {
                self.invalidate_all();
            }
        }
        logger::debug(
            LogTag::Metrics,
            &format!("Metrics invalidated for {:?}", scope),
        );
    }
}
