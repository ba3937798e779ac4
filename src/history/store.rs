// Persistent store for pool series
//
// The whole id -> record map is serialized under one storage key. Reads go
// through the in-memory mirror; writes read the backend directly, apply
// trim/replace/prune, then persist through the eviction manager.

use super::clock::Clock;
use super::eviction::EvictionManager;
use super::mirror::StoreMirror;
use super::storage::StorageBackend;
use super::types::{DataPoint, HistoryMap, SeriesRecord, StoreStats, WriteOutcome};
use crate::config::HistoryConfig;
use crate::errors::HistoryResult;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// What a store mutation touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    Ids(Vec<String>),
    All,
}

impl InvalidationScope {
    pub fn contains(&self, id: &str) -> bool {
        match self {
            InvalidationScope::Ids(ids) => ids.iter().any(|i| i == id),
            InvalidationScope::All => true,
        }
    }
}

/// Receives a callback after every store mutation
pub trait StoreListener: Send + Sync {
    fn on_invalidate(&self, scope: &InvalidationScope);
}

/// Monotonic change counter shared by the store and its caches
#[derive(Debug, Default)]
pub struct GenerationCounter(AtomicU64);

impl GenerationCounter {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub struct HistoryStore {
    backend: Arc<dyn StorageBackend>,
    storage_key: String,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    window: Duration,
    mirror: StoreMirror,
    eviction: EvictionManager,
    generation: Arc<GenerationCounter>,
    listeners: RwLock<Vec<Weak<dyn StoreListener>>>,
    /// Serializes read-modify-write cycles on the stored map
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        config: &HistoryConfig,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            storage_key: storage_key.into(),
            mirror: StoreMirror::new(config.mirror_ttl(), Arc::clone(&clock)),
            clock,
            ttl: config.ttl(),
            window: config.window(),
            eviction: EvictionManager::new(config.eviction_first_pass),
            generation: Arc::new(GenerationCounter::default()),
            listeners: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    pub(crate) fn generation_counter(&self) -> Arc<GenerationCounter> {
        Arc::clone(&self.generation)
    }

    /// Register a listener; dropped listeners are pruned lazily
    pub fn add_listener(&self, listener: Weak<dyn StoreListener>) {
        self.listeners.write().push(listener);
    }

    // ==================== Reads ====================

    pub fn get(&self, id: &str) -> Option<SeriesRecord> {
        self.snapshot().get(id).cloned()
    }

    /// Whole decoded map, shared with the mirror
    pub fn snapshot(&self) -> Arc<HistoryMap> {
        self.mirror.get_or_load(|| self.read_backend())
    }

    /// Stored ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshot().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_fresh(&self, id: &str) -> bool {
        let now = self.now();
        self.snapshot()
            .get(id)
            .map(|record| record.is_fresh(now, self.ttl))
            .unwrap_or(false)
    }

    /// Ids from `ids` that have no record or a stale one, in input order
    pub fn missing_or_stale<S: AsRef<str>>(&self, ids: &[S]) -> Vec<String> {
        let now = self.now();
        let snapshot = self.snapshot();
        ids.iter()
            .map(|id| id.as_ref())
            .filter(|id| {
                snapshot
                    .get(*id)
                    .map(|record| !record.is_fresh(now, self.ttl))
                    .unwrap_or(true)
            })
            .map(str::to_string)
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let now = self.now();
        let snapshot = self.snapshot();

        StoreStats {
            records: snapshot.len(),
            total_points: snapshot.values().map(|r| r.points.len()).sum(),
            stale_records: snapshot
                .values()
                .filter(|r| !r.is_fresh(now, self.ttl))
                .count(),
            bytes: match self.backend.used_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    logger::warning(
                        LogTag::Store,
                        &format!("Failed to read storage usage, reporting 0 bytes: {}", e),
                    );
                    0
                }
            },
            oldest_fetch: snapshot.values().map(|r| r.fetched_at).min(),
            newest_fetch: snapshot.values().map(|r| r.fetched_at).max(),
        }
    }

    // ==================== Writes ====================

    /// Replace the record for `id` with the trailing window of `points`
    ///
    /// Other records past their TTL are pruned in the same write. When the
    /// backend rejects the write for capacity, the eviction manager frees
    /// space and retries; if that fails the capacity error is returned and
    /// the previously stored map is left as it was.
    pub fn put(&self, id: &str, points: Vec<DataPoint>) -> HistoryResult<WriteOutcome> {
        let now = self.now();
        let received = points.len();

        let cutoff = now - self.window;
        let mut kept: Vec<DataPoint> = points
            .into_iter()
            .filter(|point| point.timestamp >= cutoff)
            .collect();
        kept.sort_by_key(|point| point.timestamp);

        let write_guard = self.write_lock.lock();
        let mut records = self.read_backend();
        records.insert(
            id.to_string(),
            SeriesRecord {
                id: id.to_string(),
                points: kept,
                fetched_at: now,
            },
        );

        let mut pruned: Vec<String> = records
            .iter()
            .filter(|(other, record)| other.as_str() != id && !record.is_fresh(now, self.ttl))
            .map(|(other, _)| other.clone())
            .collect();
        pruned.sort();
        for other in &pruned {
            records.remove(other);
        }

        let result = self
            .eviction
            .write_with_eviction(self.backend.as_ref(), &self.storage_key, &mut records, id);
        self.mirror.invalidate();
        let eviction = result?;
        let generation = self.generation.bump();
        drop(write_guard);

        let stored = records.get(id).map(|r| r.points.len()).unwrap_or(0);
        let mut touched = vec![id.to_string()];
        touched.extend(pruned.iter().cloned());
        if let Some(report) = &eviction {
            touched.extend(report.evicted.iter().cloned());
        }

        self.notify(&InvalidationScope::Ids(touched));

        logger::debug(
            LogTag::Store,
            &format!(
                "Stored {}: {} of {} points kept, {} pruned, generation {}",
                id,
                stored,
                received,
                pruned.len(),
                generation
            ),
        );

        Ok(WriteOutcome {
            generation,
            pruned,
            eviction,
        })
    }

    /// Remove every record
    pub fn clear(&self) -> HistoryResult<u64> {
        let generation = {
            let _write_guard = self.write_lock.lock();
            let result = self.backend.remove_item(&self.storage_key);
            self.mirror.invalidate();
            result?;
            self.generation.bump()
        };

        self.notify(&InvalidationScope::All);
        logger::info(LogTag::Store, "History store cleared");
        Ok(generation)
    }

    // ==================== Private ====================

    fn read_backend(&self) -> HistoryMap {
        let raw = match self.backend.get_item(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HistoryMap::new(),
            Err(e) => {
                logger::warning(
                    LogTag::Store,
                    &format!("Failed to read '{}', treating store as empty: {}", self.storage_key, e),
                );
                return HistoryMap::new();
            }
        };

        match serde_json::from_str::<HistoryMap>(&raw) {
            Ok(records) => records,
            Err(e) => {
                logger::warning(
                    LogTag::Store,
                    &format!("Stored history is unreadable, treating store as empty: {}", e),
                );
                HistoryMap::new()
            }
        }
    }

    fn notify(&self, scope: &InvalidationScope) {
        let listeners: Vec<Arc<dyn StoreListener>> = {
            let mut guard = self.listeners.write();
            guard.retain(|weak| weak.strong_count() > 0);
            guard.iter().filter_map(Weak::upgrade).collect()
        };

        for listener in listeners {
            listener.on_invalidate(scope);
        }
    }
}
